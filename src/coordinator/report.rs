// ABOUTME: FanOutReport - what a coordinator run hands back to its caller:
// ABOUTME: terminal status, sibling counts, forwarded events and final state.

use std::collections::HashMap;

use crate::state::{WorkflowState, WorkflowStatus};
use crate::subtask::Event;

/// Summary error attached when every parallel sibling failed.
pub const ALL_FAILED_MESSAGE: &str = "All parallel sub-tasks failed";

/// Result of one coordinator run.
#[derive(Debug, Clone)]
pub struct FanOutReport {
    /// Terminal status of the run.
    pub status: WorkflowStatus,

    /// Siblings that succeeded.
    pub succeeded: usize,

    /// Siblings that failed.
    pub failed: usize,

    /// Forwarded sibling events in declaration order, including one failure
    /// event per failed sibling.
    pub events: Vec<Event>,

    /// Summary error for a Failed run.
    pub error: Option<String>,

    /// Final workflow snapshot. Only present in keyed-aggregation mode.
    pub workflow: Option<WorkflowState>,
}

impl FanOutReport {
    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Completed
    }

    /// Aggregated outputs, in keyed mode.
    pub fn outputs(&self) -> Option<&HashMap<String, String>> {
        self.workflow.as_ref().map(|w| w.outputs())
    }

    /// Every text fragment from every forwarded event, newline-joined.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .flat_map(|e| e.text_fragments())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Failure events only.
    pub fn failures(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|e| e.is_error())
    }
}
