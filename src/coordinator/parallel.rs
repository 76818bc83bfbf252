// ABOUTME: ParallelCoordinator - bounded fan-out of sibling sub-tasks with
// ABOUTME: keyed output aggregation, settlement and snapshot publication.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::Instrument;

use super::admission::{AdmissionGate, DEFAULT_MAX_WORKERS, validate_max_workers};
use super::report::{ALL_FAILED_MESSAGE, FanOutReport};
use super::sibling::{self, SiblingOutcome};
use crate::context::ExecutionContext;
use crate::error::{FanoutError, SubTaskError, ValidationError};
use crate::state::{AggregationStore, DEFAULT_MAX_VALUE_BYTES, WorkflowStatus};
use crate::subtask::{EventStream, SubTask, SubTaskDefinition};
use crate::workflow::keys;

/// Admission waits longer than this are logged.
const SLOW_ADMISSION: Duration = Duration::from_millis(10);

/// Runs sibling sub-tasks concurrently, at most `max_workers` at a time.
///
/// If any sibling declares an output key the coordinator aggregates: each run
/// gets a `WorkflowState` keyed by the parent session id, successful outputs
/// are committed through the store, and on settlement the whole output map is
/// merged into the parent session in one step. Otherwise siblings share the
/// parent context and their events are forwarded as they are.
///
/// Siblings are interleaved on the calling task. A failing sibling never
/// aborts the others.
#[derive(Debug, Clone)]
pub struct ParallelCoordinator {
    name: String,
    namespace: String,
    sub_tasks: Vec<SubTaskDefinition>,
    max_workers: usize,
    max_value_bytes: usize,
    store: Option<Arc<AggregationStore>>,
}

/// Builder for [`ParallelCoordinator`]. Validation happens in [`build`](Self::build).
#[derive(Debug)]
pub struct ParallelCoordinatorBuilder {
    name: String,
    namespace: String,
    sub_tasks: Vec<SubTaskDefinition>,
    max_workers: usize,
    max_value_bytes: usize,
    store: Option<Arc<AggregationStore>>,
}

impl ParallelCoordinatorBuilder {
    /// Default namespace for siblings that do not declare one.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Concurrency bound, 1..=50.
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Value cap for the store each run creates.
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

    /// Commit into an existing store instead of a fresh one per run.
    /// Its own value cap applies.
    pub fn with_store(mut self, store: Arc<AggregationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validate `max_workers` and sibling key uniqueness.
    pub fn build(self) -> Result<ParallelCoordinator, ValidationError> {
        validate_max_workers(self.max_workers)?;
        keys::ensure_unique(self.sub_tasks.iter().filter_map(|d| d.output_key.as_deref()))?;

        Ok(ParallelCoordinator {
            name: self.name,
            namespace: self.namespace,
            sub_tasks: self.sub_tasks,
            max_workers: self.max_workers,
            max_value_bytes: self.max_value_bytes,
            store: self.store,
        })
    }
}

impl ParallelCoordinator {
    pub fn builder(name: impl Into<String>) -> ParallelCoordinatorBuilder {
        ParallelCoordinatorBuilder {
            name: name.into(),
            namespace: "default".to_string(),
            sub_tasks: Vec::new(),
            max_workers: DEFAULT_MAX_WORKERS,
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

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn sub_tasks(&self) -> &[SubTaskDefinition] {
        &self.sub_tasks
    }

    /// Whether any sibling declares an output key.
    pub fn is_keyed(&self) -> bool {
        self.sub_tasks.iter().any(|d| d.output_key.is_some())
    }

    /// Fan out over every sibling and wait for all of them to settle.
    ///
    /// Sibling failures are reported, not returned. The error path is for
    /// store setup problems, such as a reused workflow id in an injected store.
    pub async fn run(&self, ctx: &ExecutionContext) -> Result<FanOutReport, FanoutError> {
        self.execute(ctx, None).await
    }

    /// Like [`run`](Self::run), but abandon siblings still in flight when
    /// `deadline` elapses.
    ///
    /// On expiry the workflow is marked Cancelled and nothing is published.
    /// Outputs committed so far stay in the returned snapshot, and the report
    /// carries the events of every sibling that settled before the deadline.
    pub async fn run_with_timeout(
        &self,
        ctx: &ExecutionContext,
        deadline: Duration,
    ) -> Result<FanOutReport, FanoutError> {
        self.execute(ctx, Some(deadline)).await
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        deadline: Option<Duration>,
    ) -> Result<FanOutReport, FanoutError> {
        let workflow_id = ctx.session_id();
        let keyed = self.is_keyed();
        let started = Instant::now();

        tracing::info!(
            workflow_id = %workflow_id,
            workflow = %self.name,
            sub_tasks = self.sub_tasks.len(),
            max_workers = self.max_workers,
            keyed,
            "Starting parallel fan-out"
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

        let gate = AdmissionGate::new(self.max_workers)?.labelled(&self.name);
        // Outcomes land here as siblings settle, so a deadline keeps them.
        let settled: Mutex<Vec<Option<SiblingOutcome>>> =
            Mutex::new(std::iter::repeat_with(|| None).take(self.sub_tasks.len()).collect());
        let siblings = self.sub_tasks.iter().enumerate().map(|(index, def)| {
            let span = tracing::info_span!(
                "sub_task",
                workflow_id = %workflow_id,
                index,
                task = %def.name,
                output_key = def.output_key.as_deref().unwrap_or("")
            );
            let settled = &settled;
            let sibling = self.admit_and_run(index, def, ctx, &gate, store.as_deref());
            async move {
                let outcome = sibling.await;
                settled.lock()[index] = Some(outcome);
            }
            .instrument(span)
        });

        match deadline {
            None => {
                join_all(siblings).await;
            }
            Some(deadline) => {
                // In-flight siblings are dropped here, before the workflow is settled.
                let timed = tokio::time::timeout(deadline, join_all(siblings)).await;
                if timed.is_err() {
                    let outcomes = settled.into_inner().into_iter().flatten().collect();
                    return self
                        .cancel(workflow_id, store.as_deref(), deadline, outcomes)
                        .await;
                }
            }
        }

        let outcomes: Vec<SiblingOutcome> = settled.into_inner().into_iter().flatten().collect();
        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        let failed = outcomes.len() - succeeded;
        let events = outcomes.into_iter().flat_map(|o| o.events).collect();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let Some(store) = store else {
            let status = if failed > 0 && succeeded == 0 {
                WorkflowStatus::Failed
            } else {
                WorkflowStatus::Completed
            };
            tracing::info!(workflow_id = %workflow_id, succeeded, failed, elapsed_ms, "Parallel fan-out settled");
            return Ok(FanOutReport {
                status,
                succeeded,
                failed,
                events,
                error: (status == WorkflowStatus::Failed).then(|| ALL_FAILED_MESSAGE.to_string()),
                workflow: None,
            });
        };

        let state = if succeeded > 0 {
            let state = store.mark_completed(workflow_id).await?;
            ctx.session().extend(state.outputs().clone());
            tracing::info!(
                workflow_id = %workflow_id,
                succeeded,
                failed,
                outputs = state.outputs().len(),
                elapsed_ms,
                "Parallel fan-out completed, outputs published"
            );
            state
        } else {
            let state = store.mark_failed(workflow_id, ALL_FAILED_MESSAGE).await?;
            tracing::error!(workflow_id = %workflow_id, failed, elapsed_ms, "{}", ALL_FAILED_MESSAGE);
            state
        };

        Ok(FanOutReport {
            status: state.status(),
            succeeded,
            failed,
            events,
            error: state.error_message().map(String::from),
            workflow: Some(state),
        })
    }

    async fn admit_and_run(
        &self,
        index: usize,
        def: &SubTaskDefinition,
        ctx: &ExecutionContext,
        gate: &AdmissionGate,
        store: Option<&AggregationStore>,
    ) -> SiblingOutcome {
        let wait_start = Instant::now();
        let _permit = match gate.acquire().await {
            Ok(permit) => permit,
            Err(cancelled) => {
                return SiblingOutcome::rejected(&self.name, def, cancelled.to_string());
            }
        };
        let waited = wait_start.elapsed();
        if waited > SLOW_ADMISSION {
            tracing::debug!(
                wait_ms = waited.as_millis() as u64,
                in_flight = gate.in_flight(),
                waiting = gate.waiting(),
                "Admitted sub-task after waiting"
            );
        }

        match store {
            Some(store) => {
                sibling::run_keyed(&self.name, index, def, &self.namespace, ctx, store).await
            }
            None => sibling::run_shared(&self.name, def, ctx).await,
        }
    }

    async fn cancel(
        &self,
        workflow_id: &str,
        store: Option<&AggregationStore>,
        deadline: Duration,
        outcomes: Vec<SiblingOutcome>,
    ) -> Result<FanOutReport, FanoutError> {
        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        let failed = outcomes.len() - succeeded;
        let abandoned = self.sub_tasks.len() - outcomes.len();
        let events = outcomes.into_iter().flat_map(|o| o.events).collect();

        let workflow = match store {
            Some(store) => Some(store.mark_cancelled(workflow_id).await?),
            None => None,
        };
        tracing::warn!(
            workflow_id = %workflow_id,
            deadline_ms = deadline.as_millis() as u64,
            succeeded,
            failed,
            abandoned,
            "Parallel fan-out timed out, in-flight sub-tasks abandoned"
        );

        Ok(FanOutReport {
            status: WorkflowStatus::Cancelled,
            succeeded,
            failed,
            events,
            error: None,
            workflow,
        })
    }
}

impl SubTask for ParallelCoordinator {
    /// Run the fan-out as a nested sub-task: forward every sibling event,
    /// then fail if the whole fan-out failed.
    fn run(&self, ctx: ExecutionContext) -> EventStream {
        let this = self.clone();
        Box::pin(async_stream::try_stream! {
            let report = ParallelCoordinator::run(&this, &ctx)
                .await
                .map_err(SubTaskError::failed)?;
            for event in report.events {
                yield event;
            }
            if report.status == WorkflowStatus::Failed {
                Err(SubTaskError::msg(report.error.unwrap_or_else(|| ALL_FAILED_MESSAGE.to_string())))?;
            }
        })
    }
}
