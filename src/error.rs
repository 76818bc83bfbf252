// ABOUTME: Defines all error types for the fanout library using thiserror.
// ABOUTME: Each concern has its own error enum, unified under FanoutError.

/// Top-level error type for the fanout library.
#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Sub-task error: {0}")]
    SubTask(#[from] SubTaskError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Construction-time validation failures. Raised before any scheduling begins.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("max_workers must be between 1 and 50, got {value}")]
    MaxWorkersOutOfRange { value: usize },

    #[error("Duplicate output key values found: [{}]", .0.join(", "))]
    DuplicateOutputKeys(Vec<String>),

    #[error("Output key cannot be empty")]
    EmptyOutputKey,

    #[error("Output key '{key}' exceeds {max} characters")]
    OutputKeyTooLong { key: String, max: usize },

    #[error(
        "Output key '{0}' must start with a letter or underscore and contain only letters, digits, underscores"
    )]
    InvalidOutputKey(String),
}

/// Errors from the aggregation store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Workflow with session ID '{0}' not found")]
    NotFound(String),

    #[error("Workflow with session ID '{0}' already exists")]
    AlreadyExists(String),

    #[error("Output value for key '{key}' exceeds maximum size ({size} > {max} bytes)")]
    SizeLimit { key: String, size: usize, max: usize },

    #[error("Workflow '{id}' already settled as {status}")]
    AlreadySettled { id: String, status: String },
}

/// A single sub-task failed. Captured per sibling, never aborts the others.
#[derive(Debug, thiserror::Error)]
pub enum SubTaskError {
    #[error("{0}")]
    Failed(#[source] anyhow::Error),

    #[error("Instruction error: {0}")]
    Instruction(#[from] TemplateError),

    #[error("Commit rejected: {0}")]
    Commit(#[from] StoreError),
}

impl SubTaskError {
    /// Wrap any error as a sub-task body failure.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Failed(err.into())
    }

    /// Build a body failure from a plain message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Failed(anyhow::anyhow!("{}", message))
    }
}

/// Errors from placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("State key '{key}' not found. Available keys: [{}]", .available.join(", "))]
    MissingKey { key: String, available: Vec<String> },
}

/// Errors from loading or building a workflow configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Sub-task '{0}' could not be resolved")]
    UnknownSubTask(String),

    #[error("Invalid workflow: {0}")]
    Validation(#[from] ValidationError),
}
