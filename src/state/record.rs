// ABOUTME: Workflow state records - the per-workflow output map, execution
// ABOUTME: history, and one-way status lifecycle held by the aggregation store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Default cap on a single output value: 10 MiB.
pub const DEFAULT_MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;

/// Lifecycle of one workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowStatus::Running)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Running => write!(f, "running"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
            WorkflowStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of a single sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// Record of one settled sibling. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTaskExecution {
    /// 0-based position among siblings.
    pub index: usize,
    pub task_name: String,
    pub task_namespace: String,
    /// Derived child session id, `{parent}-sub-{index}`.
    pub session_id: String,
    pub output_key: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub output_size_bytes: usize,
    pub error: Option<String>,
    /// 1-based commit order among successful siblings. None for failures.
    pub completion_order: Option<u32>,
}

impl SubTaskExecution {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

/// What a coordinator knows about a sibling before it settles.
#[derive(Debug, Clone)]
pub struct ExecutionDraft {
    pub index: usize,
    pub task_name: String,
    pub task_namespace: String,
    pub session_id: String,
    pub output_key: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl ExecutionDraft {
    /// Start a draft now.
    pub fn start(
        index: usize,
        task_name: impl Into<String>,
        task_namespace: impl Into<String>,
        session_id: impl Into<String>,
        output_key: Option<String>,
    ) -> Self {
        Self {
            index,
            task_name: task_name.into(),
            task_namespace: task_namespace.into(),
            session_id: session_id.into(),
            output_key,
            started_at: Utc::now(),
        }
    }

    pub(crate) fn finish(
        self,
        status: ExecutionStatus,
        output_size_bytes: usize,
        error: Option<String>,
        completion_order: Option<u32>,
    ) -> SubTaskExecution {
        SubTaskExecution {
            index: self.index,
            task_name: self.task_name,
            task_namespace: self.task_namespace,
            session_id: self.session_id,
            output_key: self.output_key,
            started_at: self.started_at,
            completed_at: Utc::now(),
            status,
            output_size_bytes,
            error,
            completion_order,
        }
    }
}

/// Complete state of one workflow execution.
///
/// Values handed out by the store are snapshots; only the store mutates the
/// live record, and only while holding that workflow's lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    id: String,
    owner: String,
    workflow_name: String,
    namespace: String,
    outputs: HashMap<String, String>,
    executions: Vec<SubTaskExecution>,
    status: WorkflowStatus,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completions: u32,
}

impl WorkflowState {
    pub(crate) fn new(
        id: impl Into<String>,
        owner: impl Into<String>,
        workflow_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner: owner.into(),
            workflow_name: workflow_name.into(),
            namespace: namespace.into(),
            outputs: HashMap::new(),
            executions: Vec::new(),
            status: WorkflowStatus::Running,
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            completions: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn outputs(&self) -> &HashMap<String, String> {
        &self.outputs
    }

    pub fn get_output(&self, key: &str) -> Option<&str> {
        self.outputs.get(key).map(String::as_str)
    }

    pub fn executions(&self) -> &[SubTaskExecution] {
        &self.executions
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Number of successful commits so far.
    pub fn completions(&self) -> u32 {
        self.completions
    }

    /// Store a value after checking its UTF-8 size. Returns the size in bytes.
    ///
    /// On rejection nothing is touched.
    pub(crate) fn set_output(
        &mut self,
        key: &str,
        value: String,
        max_bytes: usize,
    ) -> Result<usize, StoreError> {
        let size = value.len();
        if size > max_bytes {
            return Err(StoreError::SizeLimit {
                key: key.to_string(),
                size,
                max: max_bytes,
            });
        }
        self.outputs.insert(key.to_string(), value);
        self.touch();
        Ok(size)
    }

    pub(crate) fn next_completion_order(&mut self) -> u32 {
        self.completions += 1;
        self.completions
    }

    pub(crate) fn add_execution(&mut self, execution: SubTaskExecution) {
        self.executions.push(execution);
        self.touch();
    }

    /// Move out of Running. Fails if already terminal.
    pub(crate) fn settle(
        &mut self,
        status: WorkflowStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        if self.status.is_terminal() {
            return Err(StoreError::AlreadySettled {
                id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        let now = Utc::now();
        self.status = status;
        self.error_message = error_message;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
