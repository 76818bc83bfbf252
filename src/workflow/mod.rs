// ABOUTME: Workflow module - output-key policy, instruction templating, and
// ABOUTME: YAML workflow configuration built into runnable coordinators.

mod config;
pub mod keys;
mod runner;
mod template;

pub use config::{
    SubTaskCatalog, SubTaskReference, SubTaskResolver, WorkflowConfig, WorkflowType,
};
pub use runner::Workflow;
pub use template::{placeholders, substitute};

#[cfg(test)]
mod config_test;
#[cfg(test)]
mod keys_test;
#[cfg(test)]
mod template_test;
