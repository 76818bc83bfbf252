// ABOUTME: Metric names emitted by coordinators, the admission gate and the store.
// ABOUTME: Recorded through the `metrics` facade; the host installs an exporter.

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};

/// Successful output commits, labelled by workflow and namespace.
pub const STATE_WRITES_TOTAL: &str = "fanout_state_writes_total";

/// Time spent waiting for a workflow's commit lock, labelled by workflow.
pub const LOCK_WAIT_SECONDS: &str = "fanout_lock_wait_seconds";

/// Siblings blocked at the admission gate, labelled by workflow.
pub const QUEUE_DEPTH: &str = "fanout_queue_depth";

/// Siblings holding an admission slot, labelled by workflow.
pub const ACTIVE_EXECUTIONS: &str = "fanout_active_executions";

/// Configured concurrency bound, labelled by workflow.
pub const MAX_WORKERS_LIMIT: &str = "fanout_max_workers";

/// Bucket bounds for [`LOCK_WAIT_SECONDS`], 1 µs to 100 ms, for exporters
/// that take explicit buckets.
pub const LOCK_WAIT_BUCKETS: &[f64] = &[
    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
];

/// Register units and help text with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(STATE_WRITES_TOTAL, "Output values committed to the aggregation store");
    describe_histogram!(
        LOCK_WAIT_SECONDS,
        Unit::Seconds,
        "Wait for a workflow's commit lock"
    );
    describe_gauge!(QUEUE_DEPTH, "Sub-tasks waiting for an admission slot");
    describe_gauge!(ACTIVE_EXECUTIONS, "Sub-tasks holding an admission slot");
    describe_gauge!(MAX_WORKERS_LIMIT, "Configured admission slots");
}
