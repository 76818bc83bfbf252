// ABOUTME: Workflow - a configured parallel or sequential coordinator behind
// ABOUTME: one type, runnable directly or nested as a sub-task.

use super::config::WorkflowType;
use crate::context::ExecutionContext;
use crate::coordinator::{FanOutReport, ParallelCoordinator, SequentialCoordinator};
use crate::error::FanoutError;
use crate::subtask::{EventStream, SubTask, SubTaskDefinition};

/// Either coordinator, as built from a [`WorkflowConfig`](super::WorkflowConfig).
#[derive(Debug, Clone)]
pub enum Workflow {
    Parallel(ParallelCoordinator),
    Sequential(SequentialCoordinator),
}

impl Workflow {
    pub fn name(&self) -> &str {
        match self {
            Workflow::Parallel(c) => c.name(),
            Workflow::Sequential(c) => c.name(),
        }
    }

    pub fn workflow_type(&self) -> WorkflowType {
        match self {
            Workflow::Parallel(_) => WorkflowType::Parallel,
            Workflow::Sequential(_) => WorkflowType::Sequential,
        }
    }

    pub fn sub_tasks(&self) -> &[SubTaskDefinition] {
        match self {
            Workflow::Parallel(c) => c.sub_tasks(),
            Workflow::Sequential(c) => c.sub_tasks(),
        }
    }

    pub async fn run(&self, ctx: &ExecutionContext) -> Result<FanOutReport, FanoutError> {
        match self {
            Workflow::Parallel(c) => c.run(ctx).await,
            Workflow::Sequential(c) => c.run(ctx).await,
        }
    }
}

impl From<ParallelCoordinator> for Workflow {
    fn from(coordinator: ParallelCoordinator) -> Self {
        Workflow::Parallel(coordinator)
    }
}

impl From<SequentialCoordinator> for Workflow {
    fn from(coordinator: SequentialCoordinator) -> Self {
        Workflow::Sequential(coordinator)
    }
}

impl SubTask for Workflow {
    fn run(&self, ctx: ExecutionContext) -> EventStream {
        match self {
            Workflow::Parallel(c) => SubTask::run(c, ctx),
            Workflow::Sequential(c) => SubTask::run(c, ctx),
        }
    }
}
