// ABOUTME: Root module for fanout - bounded fan-out of sub-tasks with keyed
// ABOUTME: output aggregation. Re-exports the public surface of each submodule.

pub mod context;
pub mod coordinator;
pub mod error;
pub mod prelude;
pub mod state;
pub mod subtask;
pub mod telemetry;
pub mod workflow;

pub use error::FanoutError;
