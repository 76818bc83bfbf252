// ABOUTME: Sub-task definition - the sibling descriptor a coordinator schedules.
// ABOUTME: Output key, namespace and instruction are explicit optional fields.

use std::fmt;
use std::sync::Arc;

use super::SubTask;

/// Descriptor for one sibling in a fan-out.
#[derive(Clone)]
pub struct SubTaskDefinition {
    /// Sub-task name, used for logging, events and key generation.
    pub name: String,

    /// Namespace. If None, the coordinator's namespace applies.
    pub namespace: Option<String>,

    /// Key under which the sibling's output is published.
    /// Any sibling with a key switches the coordinator to keyed aggregation.
    pub output_key: Option<String>,

    /// Instruction template expanded against the sibling's starting snapshot.
    pub instruction: Option<String>,

    /// The work itself.
    pub task: Arc<dyn SubTask>,
}

impl SubTaskDefinition {
    /// Create a definition with only the required fields.
    pub fn new(name: impl Into<String>, task: Arc<dyn SubTask>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            output_key: None,
            instruction: None,
            task,
        }
    }

    /// Set the namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the output key.
    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Set the instruction template.
    pub fn instruction(mut self, template: impl Into<String>) -> Self {
        self.instruction = Some(template.into());
        self
    }

    /// Namespace, falling back to `default` when unset.
    pub fn namespace_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default)
    }
}

impl fmt::Debug for SubTaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubTaskDefinition")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("output_key", &self.output_key)
            .field("instruction", &self.instruction)
            .finish_non_exhaustive()
    }
}
