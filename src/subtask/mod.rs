// ABOUTME: Sub-task module - the contract between coordinators and the work they run.
// ABOUTME: Provides the SubTask trait, its event type, and the sibling descriptor.

mod definition;
mod event;
mod traits;

pub use definition::SubTaskDefinition;
pub use event::{Event, EventError, SUB_TASK_ERROR};
pub use traits::{EventStream, FnSubTask, SubTask, TextSubTask, TextTask};
