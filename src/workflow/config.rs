// ABOUTME: Workflow configuration - YAML-loaded description of a parallel or
// ABOUTME: sequential workflow, resolved into runnable coordinators.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::keys;
use super::runner::Workflow;
use crate::coordinator::{
    DEFAULT_MAX_WORKERS, ParallelCoordinator, SequentialCoordinator, validate_max_workers,
};
use crate::error::{ConfigError, ValidationError};
use crate::state::DEFAULT_MAX_VALUE_BYTES;
use crate::subtask::{SubTask, SubTaskDefinition};

fn default_namespace() -> String {
    "default".to_string()
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_max_value_bytes() -> usize {
    DEFAULT_MAX_VALUE_BYTES
}

/// How a workflow schedules its sub-tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    #[default]
    Parallel,
    Sequential,
}

/// One sub-task entry in a workflow configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskReference {
    pub name: String,

    /// Inherits the workflow namespace when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Used verbatim when set; generated from namespace and name otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction: Option<String>,
}

impl SubTaskReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            output_key: None,
            instruction: None,
        }
    }

    /// `namespace/name` when a namespace is set, otherwise just the name.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    fn inherit_namespace(&self, default: &str) -> Self {
        let mut resolved = self.clone();
        if resolved.namespace.is_none() {
            resolved.namespace = Some(default.to_string());
        }
        resolved
    }
}

/// Maps a configured reference to something runnable.
///
/// References passed in always carry a namespace.
pub trait SubTaskResolver: Send + Sync {
    fn resolve(&self, reference: &SubTaskReference) -> Option<Arc<dyn SubTask>>;
}

impl<F> SubTaskResolver for F
where
    F: Fn(&SubTaskReference) -> Option<Arc<dyn SubTask>> + Send + Sync,
{
    fn resolve(&self, reference: &SubTaskReference) -> Option<Arc<dyn SubTask>> {
        self(reference)
    }
}

/// Resolver backed by a name table.
///
/// Lookups try `namespace/name` first, then the bare name.
#[derive(Default, Clone)]
pub struct SubTaskCatalog {
    tasks: HashMap<String, Arc<dyn SubTask>>,
}

impl SubTaskCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under a bare name, matching any namespace.
    pub fn register(mut self, name: impl Into<String>, task: Arc<dyn SubTask>) -> Self {
        self.tasks.insert(name.into(), task);
        self
    }

    /// Register under `namespace/name`.
    pub fn register_in(
        mut self,
        namespace: &str,
        name: &str,
        task: Arc<dyn SubTask>,
    ) -> Self {
        self.tasks.insert(format!("{}/{}", namespace, name), task);
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl SubTaskResolver for SubTaskCatalog {
    fn resolve(&self, reference: &SubTaskReference) -> Option<Arc<dyn SubTask>> {
        self.tasks
            .get(&reference.qualified_name())
            .or_else(|| self.tasks.get(&reference.name))
            .cloned()
    }
}

impl std::fmt::Debug for SubTaskCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.tasks.keys().collect();
        names.sort();
        f.debug_struct("SubTaskCatalog").field("tasks", &names).finish()
    }
}

/// Declarative description of one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default, rename = "type", alias = "workflow_type")]
    pub workflow_type: WorkflowType,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_max_value_bytes")]
    pub max_value_bytes: usize,

    #[serde(default)]
    pub sub_tasks: Vec<SubTaskReference>,
}

impl WorkflowConfig {
    /// A parallel workflow with defaults and no sub-tasks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            namespace: default_namespace(),
            workflow_type: WorkflowType::Parallel,
            max_workers: DEFAULT_MAX_WORKERS,
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            sub_tasks: Vec::new(),
        }
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: WorkflowConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Load a configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Output key for every sub-task, in declaration order.
    ///
    /// Explicit keys are taken verbatim. Generated keys must pass the key
    /// policy with the longer config-path limit.
    pub fn output_keys(&self) -> Result<Vec<String>, ValidationError> {
        self.sub_tasks
            .iter()
            .map(|reference| match &reference.output_key {
                Some(key) => Ok(key.clone()),
                None => {
                    let namespace = reference.namespace.as_deref().unwrap_or(&self.namespace);
                    let key = keys::generate(namespace, &reference.name);
                    keys::validate_with_max(&key, keys::CONFIG_MAX_KEY_LEN)?;
                    Ok(key)
                }
            })
            .collect()
    }

    /// Check everything that can be checked without resolving sub-tasks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workflow_type == WorkflowType::Parallel {
            validate_max_workers(self.max_workers)?;
        }
        let output_keys = self.output_keys()?;
        keys::ensure_unique(output_keys.iter().map(String::as_str))
    }

    /// Resolve every sub-task and build the coordinator.
    pub fn build<R>(&self, resolver: &R) -> Result<Workflow, ConfigError>
    where
        R: SubTaskResolver + ?Sized,
    {
        let output_keys = self.output_keys()?;

        let mut defs = Vec::with_capacity(self.sub_tasks.len());
        for (reference, key) in self.sub_tasks.iter().zip(output_keys) {
            let resolved = reference.inherit_namespace(&self.namespace);
            let task = resolver
                .resolve(&resolved)
                .ok_or_else(|| ConfigError::UnknownSubTask(resolved.qualified_name()))?;

            let mut def = SubTaskDefinition::new(&resolved.name, task).output_key(key);
            if let Some(namespace) = resolved.namespace {
                def = def.namespace(namespace);
            }
            if let Some(instruction) = resolved.instruction {
                def = def.instruction(instruction);
            }
            defs.push(def);
        }

        let workflow: Workflow = match self.workflow_type {
            WorkflowType::Parallel => ParallelCoordinator::builder(&self.name)
                .namespace(&self.namespace)
                .max_workers(self.max_workers)
                .max_value_bytes(self.max_value_bytes)
                .sub_tasks(defs)
                .build()?
                .into(),
            WorkflowType::Sequential => SequentialCoordinator::builder(&self.name)
                .namespace(&self.namespace)
                .max_value_bytes(self.max_value_bytes)
                .sub_tasks(defs)
                .build()?
                .into(),
        };

        tracing::info!(
            workflow = %self.name,
            workflow_type = ?self.workflow_type,
            sub_tasks = self.sub_tasks.len(),
            "Built workflow from config"
        );
        Ok(workflow)
    }
}
