// ABOUTME: Implements the AggregationStore - an in-memory table of workflow
// ABOUTME: states whose commits serialize through one async lock per workflow.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};

use super::record::{
    DEFAULT_MAX_VALUE_BYTES, ExecutionDraft, ExecutionStatus, SubTaskExecution, WorkflowState,
    WorkflowStatus,
};
use crate::error::StoreError;
use crate::telemetry;

/// In-memory table of workflow states keyed by workflow/session id.
///
/// Every mutation of a given workflow happens while holding that workflow's
/// own lock, and nothing inside the critical section awaits. Lock hold time is
/// therefore independent of how long a sub-task ran. Reads return snapshots.
#[derive(Debug)]
pub struct AggregationStore {
    workflows: RwLock<HashMap<String, Arc<Mutex<WorkflowState>>>>,
    max_value_bytes: usize,
}

impl Default for AggregationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregationStore {
    /// Create an empty store with the default 10 MiB value cap.
    pub fn new() -> Self {
        Self::with_max_value_bytes(DEFAULT_MAX_VALUE_BYTES)
    }

    /// Create an empty store with a custom value cap.
    pub fn with_max_value_bytes(max_value_bytes: usize) -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
            max_value_bytes,
        }
    }

    pub fn max_value_bytes(&self) -> usize {
        self.max_value_bytes
    }

    /// Register a new workflow in the Running state.
    pub async fn create(
        &self,
        id: &str,
        owner: &str,
        workflow_name: &str,
        namespace: &str,
    ) -> Result<WorkflowState, StoreError> {
        let mut workflows = self.workflows.write().await;
        if workflows.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }

        let state = WorkflowState::new(id, owner, workflow_name, namespace);
        workflows.insert(id.to_string(), Arc::new(Mutex::new(state.clone())));

        tracing::debug!(workflow_id = %id, workflow = %workflow_name, "Created workflow state");
        Ok(state)
    }

    /// Snapshot of a workflow, if it exists.
    pub async fn get(&self, id: &str) -> Option<WorkflowState> {
        let entry = self.entry(id).await.ok()?;
        let state = entry.lock().await;
        Some(state.clone())
    }

    /// Whether a workflow with this id exists.
    pub async fn contains(&self, id: &str) -> bool {
        self.workflows.read().await.contains_key(id)
    }

    /// Drop a workflow from the table, returning its final snapshot.
    pub async fn remove(&self, id: &str) -> Option<WorkflowState> {
        let entry = self.workflows.write().await.remove(id)?;
        let state = entry.lock().await;
        Some(state.clone())
    }

    /// Number of workflows currently held.
    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }

    /// Write one output value under the size cap.
    ///
    /// Either the value fully lands or the store is left unchanged.
    pub async fn write(&self, id: &str, key: &str, value: impl Into<String>) -> Result<(), StoreError> {
        let entry = self.entry(id).await?;
        let mut state = entry.lock().await;
        state.set_output(key, value.into(), self.max_value_bytes)?;
        Ok(())
    }

    /// Commit a successful sibling.
    ///
    /// Inside one critical section: check the value size, write it under the
    /// draft's key, take the next completion order, and append the record.
    /// A sibling without an output key still gets a record and an order. If
    /// the value is rejected nothing is written and no order is consumed.
    pub async fn commit_success(
        &self,
        id: &str,
        draft: ExecutionDraft,
        value: String,
    ) -> Result<SubTaskExecution, StoreError> {
        let entry = self.entry(id).await?;

        let wait_start = Instant::now();
        let mut state = entry.lock().await;
        let lock_wait = wait_start.elapsed();

        let size = match draft.output_key.as_deref() {
            Some(key) => state.set_output(key, value, self.max_value_bytes)?,
            None => 0,
        };
        let order = state.next_completion_order();
        let execution = draft.finish(ExecutionStatus::Success, size, None, Some(order));
        state.add_execution(execution.clone());
        let workflow = state.workflow_name().to_string();
        let namespace = state.namespace().to_string();
        drop(state);

        if execution.output_key.is_some() {
            metrics::counter!(
                telemetry::STATE_WRITES_TOTAL,
                1,
                "workflow" => workflow.clone(),
                "namespace" => namespace
            );
        }
        metrics::histogram!(
            telemetry::LOCK_WAIT_SECONDS,
            lock_wait.as_secs_f64(),
            "workflow" => workflow
        );

        tracing::debug!(
            workflow_id = %id,
            index = execution.index,
            task = %execution.task_name,
            output_key = execution.output_key.as_deref().unwrap_or(""),
            completion_order = order,
            size_bytes = size,
            lock_wait_us = lock_wait.as_micros() as u64,
            "Committed sub-task output"
        );
        Ok(execution)
    }

    /// Record a failed sibling. No output is written and no order is consumed.
    pub async fn record_failure(
        &self,
        id: &str,
        draft: ExecutionDraft,
        error: impl Into<String>,
    ) -> Result<SubTaskExecution, StoreError> {
        let entry = self.entry(id).await?;
        let mut state = entry.lock().await;

        let execution = draft.finish(ExecutionStatus::Failed, 0, Some(error.into()), None);
        state.add_execution(execution.clone());
        Ok(execution)
    }

    /// Execution records of a workflow, in settlement order.
    pub async fn executions_of(&self, id: &str) -> Result<Vec<SubTaskExecution>, StoreError> {
        let entry = self.entry(id).await?;
        let state = entry.lock().await;
        Ok(state.executions().to_vec())
    }

    /// Output map of a workflow.
    pub async fn outputs_of(&self, id: &str) -> Result<HashMap<String, String>, StoreError> {
        let entry = self.entry(id).await?;
        let state = entry.lock().await;
        Ok(state.outputs().clone())
    }

    /// Settle as Completed.
    pub async fn mark_completed(&self, id: &str) -> Result<WorkflowState, StoreError> {
        self.settle(id, WorkflowStatus::Completed, None).await
    }

    /// Settle as Failed with a summary message.
    pub async fn mark_failed(
        &self,
        id: &str,
        error_message: impl Into<String>,
    ) -> Result<WorkflowState, StoreError> {
        self.settle(id, WorkflowStatus::Failed, Some(error_message.into()))
            .await
    }

    /// Settle as Cancelled.
    pub async fn mark_cancelled(&self, id: &str) -> Result<WorkflowState, StoreError> {
        self.settle(id, WorkflowStatus::Cancelled, None).await
    }

    async fn settle(
        &self,
        id: &str,
        status: WorkflowStatus,
        error_message: Option<String>,
    ) -> Result<WorkflowState, StoreError> {
        let entry = self.entry(id).await?;
        let mut state = entry.lock().await;
        state.settle(status, error_message)?;
        Ok(state.clone())
    }

    async fn entry(&self, id: &str) -> Result<Arc<Mutex<WorkflowState>>, StoreError> {
        let workflows = self.workflows.read().await;
        workflows
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
