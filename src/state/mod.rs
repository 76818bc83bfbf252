// ABOUTME: State module - the aggregation store and the workflow records it holds.
// ABOUTME: All sibling output commits flow through this module's locked write path.

mod record;
mod store;

pub use record::{
    DEFAULT_MAX_VALUE_BYTES, ExecutionDraft, ExecutionStatus, SubTaskExecution, WorkflowState,
    WorkflowStatus,
};
pub use store::AggregationStore;
