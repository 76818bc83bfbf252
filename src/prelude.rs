// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use fanout::prelude::*;` to get started quickly.

pub use crate::context::{ExecutionContext, Session};
pub use crate::coordinator::{
    AdmissionGate, FanOutReport, ParallelCoordinator, SequentialCoordinator,
};
pub use crate::error::{
    ConfigError, FanoutError, StoreError, SubTaskError, TemplateError, ValidationError,
};
pub use crate::state::{
    AggregationStore, ExecutionStatus, SubTaskExecution, WorkflowState, WorkflowStatus,
};
pub use crate::subtask::{
    Event, EventStream, FnSubTask, SubTask, SubTaskDefinition, TextSubTask, TextTask,
};
pub use crate::workflow::{
    SubTaskCatalog, SubTaskReference, SubTaskResolver, Workflow, WorkflowConfig, WorkflowType,
    substitute,
};
