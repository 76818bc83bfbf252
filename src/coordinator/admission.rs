// ABOUTME: Admission gate bounding how many siblings run at once.
// ABOUTME: FIFO-fair counting semaphore with in-flight and waiting gauges.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ValidationError;
use crate::telemetry;

/// Smallest accepted `max_workers`.
pub const MIN_WORKERS: usize = 1;

/// Largest accepted `max_workers`.
pub const MAX_WORKERS: usize = 50;

/// `max_workers` used when none is configured.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Error returned when waiting at the gate is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("admission cancelled")]
pub struct Cancelled;

/// Check a `max_workers` value against the accepted range.
pub fn validate_max_workers(value: usize) -> Result<(), ValidationError> {
    if (MIN_WORKERS..=MAX_WORKERS).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::MaxWorkersOutOfRange { value })
    }
}

/// Counting gate with `max_workers` slots.
///
/// Waiters are admitted in the order they started waiting.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    waiting: AtomicUsize,
    workflow: String,
}

/// A held slot. Dropping it frees the slot for the next waiter.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    workflow: String,
}

impl AdmissionPermit {
    fn new(permit: OwnedSemaphorePermit, workflow: &str) -> Self {
        metrics::increment_gauge!(telemetry::ACTIVE_EXECUTIONS, 1.0, "workflow" => workflow.to_string());
        Self {
            _permit: permit,
            workflow: workflow.to_string(),
        }
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        metrics::decrement_gauge!(telemetry::ACTIVE_EXECUTIONS, 1.0, "workflow" => self.workflow.clone());
    }
}

impl AdmissionGate {
    /// Create a gate with `max_workers` slots.
    pub fn new(max_workers: usize) -> Result<Self, ValidationError> {
        validate_max_workers(max_workers)?;
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(max_workers)),
            capacity: max_workers,
            waiting: AtomicUsize::new(0),
            workflow: String::new(),
        })
    }

    /// Label the gate's metrics with a workflow name and publish its capacity.
    pub fn labelled(mut self, workflow: impl Into<String>) -> Self {
        self.workflow = workflow.into();
        metrics::gauge!(
            telemetry::MAX_WORKERS_LIMIT,
            self.capacity as f64,
            "workflow" => self.workflow.clone()
        );
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Callers currently blocked waiting for a slot.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Wait for a slot.
    pub async fn acquire(&self) -> Result<AdmissionPermit, Cancelled> {
        self.acquire_with_cancel(std::future::pending::<()>()).await
    }

    /// Wait for a slot, giving up when `cancel` completes first.
    pub async fn acquire_with_cancel<F>(&self, cancel: F) -> Result<AdmissionPermit, Cancelled>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(AdmissionPermit::new(permit, &self.workflow));
        }

        let _waiting = WaitingGuard::enter(&self.waiting, &self.workflow);
        tokio::select! {
            biased;
            () = &mut cancel => Err(Cancelled),
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                permit
                    .map(|p| AdmissionPermit::new(p, &self.workflow))
                    .map_err(|_| Cancelled)
            }
        }
    }
}

/// Keeps the waiting gauge right even when the acquiring future is dropped.
struct WaitingGuard<'a> {
    counter: &'a AtomicUsize,
    workflow: &'a str,
}

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize, workflow: &'a str) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        metrics::increment_gauge!(telemetry::QUEUE_DEPTH, 1.0, "workflow" => workflow.to_string());
        Self { counter, workflow }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        metrics::decrement_gauge!(telemetry::QUEUE_DEPTH, 1.0, "workflow" => self.workflow.to_string());
    }
}
