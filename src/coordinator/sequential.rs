// ABOUTME: SequentialCoordinator - runs sub-tasks one after another, each seeing
// ABOUTME: its predecessors' outputs, stopping at the first failure.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use super::report::FanOutReport;
use super::sibling;
use crate::context::ExecutionContext;
use crate::error::{FanoutError, SubTaskError, ValidationError};
use crate::state::{AggregationStore, DEFAULT_MAX_VALUE_BYTES, WorkflowStatus};
use crate::subtask::{EventStream, SubTask, SubTaskDefinition};
use crate::workflow::keys;

/// Pipeline of sub-tasks run in declaration order.
///
/// In keyed mode every stage is committed through the same store path as a
/// parallel fan-out, so a stage's instruction can reference any earlier
/// stage's output key and completion orders follow declaration order.
#[derive(Debug, Clone)]
pub struct SequentialCoordinator {
    name: String,
    namespace: String,
    sub_tasks: Vec<SubTaskDefinition>,
    max_value_bytes: usize,
    store: Option<Arc<AggregationStore>>,
}

#[derive(Debug)]
pub struct SequentialCoordinatorBuilder {
    name: String,
    namespace: String,
    sub_tasks: Vec<SubTaskDefinition>,
    max_value_bytes: usize,
    store: Option<Arc<AggregationStore>>,
}

impl SequentialCoordinatorBuilder {
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn max_value_bytes(mut self, max_value_bytes: usize) -> Self {
        self.max_value_bytes = max_value_bytes;
        self
    }

    pub fn sub_task(mut self, def: SubTaskDefinition) -> Self {
        self.sub_tasks.push(def);
        self
    }

    pub fn sub_tasks(mut self, defs: impl IntoIterator<Item = SubTaskDefinition>) -> Self {
        self.sub_tasks.extend(defs);
        self
    }

    pub fn with_store(mut self, store: Arc<AggregationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<SequentialCoordinator, ValidationError> {
        keys::ensure_unique(self.sub_tasks.iter().filter_map(|d| d.output_key.as_deref()))?;

        Ok(SequentialCoordinator {
            name: self.name,
            namespace: self.namespace,
            sub_tasks: self.sub_tasks,
            max_value_bytes: self.max_value_bytes,
            store: self.store,
        })
    }
}

impl SequentialCoordinator {
    pub fn builder(name: impl Into<String>) -> SequentialCoordinatorBuilder {
        SequentialCoordinatorBuilder {
            name: name.into(),
            namespace: "default".to_string(),
            sub_tasks: Vec::new(),
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            store: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn sub_tasks(&self) -> &[SubTaskDefinition] {
        &self.sub_tasks
    }

    pub fn is_keyed(&self) -> bool {
        self.sub_tasks.iter().any(|d| d.output_key.is_some())
    }

    /// Run every stage in order. The first failing stage stops the pipeline
    /// and nothing is published.
    pub async fn run(&self, ctx: &ExecutionContext) -> Result<FanOutReport, FanoutError> {
        let workflow_id = ctx.session_id();
        let keyed = self.is_keyed();
        let started = Instant::now();

        tracing::info!(
            workflow_id = %workflow_id,
            workflow = %self.name,
            sub_tasks = self.sub_tasks.len(),
            keyed,
            "Starting sequential pipeline"
        );

        let store = if keyed {
            let store = self.store.clone().unwrap_or_else(|| {
                Arc::new(AggregationStore::with_max_value_bytes(self.max_value_bytes))
            });
            store
                .create(workflow_id, ctx.user_id(), &self.name, &self.namespace)
                .await?;
            Some(store)
        } else {
            None
        };

        let mut events = Vec::new();
        let mut succeeded = 0;

        for (index, def) in self.sub_tasks.iter().enumerate() {
            let span = tracing::info_span!(
                "sub_task",
                workflow_id = %workflow_id,
                index,
                task = %def.name,
                output_key = def.output_key.as_deref().unwrap_or("")
            );
            let outcome = match store.as_deref() {
                Some(store) => {
                    sibling::run_keyed(&self.name, index, def, &self.namespace, ctx, store)
                        .instrument(span)
                        .await
                }
                None => sibling::run_shared(&self.name, def, ctx).instrument(span).await,
            };
            events.extend(outcome.events);

            if let Some(error) = outcome.error {
                let message = format!("sub-task '{}' failed: {}", def.name, error);
                tracing::error!(
                    workflow_id = %workflow_id,
                    index,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Sequential pipeline stopped: {}",
                    message
                );
                let workflow = match store.as_deref() {
                    Some(store) => Some(store.mark_failed(workflow_id, &message).await?),
                    None => None,
                };
                return Ok(FanOutReport {
                    status: WorkflowStatus::Failed,
                    succeeded,
                    failed: 1,
                    events,
                    error: Some(message),
                    workflow,
                });
            }
            succeeded += 1;
        }

        let workflow = match store.as_deref() {
            Some(store) => {
                let state = store.mark_completed(workflow_id).await?;
                ctx.session().extend(state.outputs().clone());
                Some(state)
            }
            None => None,
        };
        tracing::info!(
            workflow_id = %workflow_id,
            succeeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sequential pipeline completed"
        );

        Ok(FanOutReport {
            status: WorkflowStatus::Completed,
            succeeded,
            failed: 0,
            events,
            error: None,
            workflow,
        })
    }
}

impl SubTask for SequentialCoordinator {
    fn run(&self, ctx: ExecutionContext) -> EventStream {
        let this = self.clone();
        Box::pin(async_stream::try_stream! {
            let report = SequentialCoordinator::run(&this, &ctx)
                .await
                .map_err(SubTaskError::failed)?;
            for event in report.events {
                yield event;
            }
            if let Some(error) = report.error {
                Err(SubTaskError::msg(error))?;
            }
        })
    }
}
