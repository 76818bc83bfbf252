// ABOUTME: Coordinator module - bounded parallel fan-out and sequential pipelines
// ABOUTME: over sub-tasks, with the admission gate that bounds concurrency.

mod admission;
mod parallel;
mod report;
mod sequential;
mod sibling;

pub use admission::{
    AdmissionGate, AdmissionPermit, Cancelled, DEFAULT_MAX_WORKERS, MAX_WORKERS, MIN_WORKERS,
    validate_max_workers,
};
pub use parallel::{ParallelCoordinator, ParallelCoordinatorBuilder};
pub use report::{ALL_FAILED_MESSAGE, FanOutReport};
pub use sequential::{SequentialCoordinator, SequentialCoordinatorBuilder};
