//! Synchronous progress container shared with a worker thread
//!
//! A `ProgressBridge` sits between a synchronous, latency-critical worker
//! (a training loop or data fetch with no event loop) and the async
//! registry. Exactly one writer records progress and metrics; any number
//! of readers pull the latest snapshot and unseen metrics. Every method
//! is a short-held lock around pure memory operations: no I/O, no await,
//! no failure path, so the worker is never made to wait.
//!
//! Readers are infrequent by construction (gated by the registry's TTL,
//! not called per worker tick), so lock contention is negligible.

use crate::operation::{MetricRecord, ProgressSnapshot};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Thread-safe state holder owned by one worker
#[derive(Debug, Default)]
pub struct ProgressBridge {
    state: Mutex<BridgeState>,
    cancel_requested: AtomicBool,
}

#[derive(Debug, Default)]
struct BridgeState {
    snapshot: ProgressSnapshot,
    metrics: Vec<MetricRecord>,
}

impl ProgressBridge {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer leaves coherent state behind (the snapshot is
    // replaced whole, metric appends are single pushes), so a poisoned
    // lock is safe to re-enter.
    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Overwrite the current snapshot. Writer side; never blocks on I/O.
    pub fn update_state(&self, percentage: f64, current_step: &str, context: Map<String, Value>) {
        let mut state = self.lock();
        state.snapshot = ProgressSnapshot {
            percentage,
            current_step: current_step.to_string(),
            context,
        };
    }

    /// Append one metric record to the log. Writer side; O(1) amortized.
    pub fn append_metric(&self, data: Value) {
        let mut state = self.lock();
        state.metrics.push(MetricRecord::now(data));
    }

    /// Latest snapshot, cloned so callers never alias internal state
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot.clone()
    }

    /// All metric records with index >= cursor, plus the next cursor
    ///
    /// A cursor equal to the current length yields an empty batch. The
    /// returned cursor is always `cursor + records.len()`, never less
    /// than the input (this side never resets).
    pub fn metrics_since(&self, cursor: usize) -> (Vec<MetricRecord>, usize) {
        let state = self.lock();
        let records: Vec<MetricRecord> = state.metrics.iter().skip(cursor).cloned().collect();
        let new_cursor = cursor + records.len();
        (records, new_cursor)
    }

    /// Current length of the metric log
    pub fn metric_count(&self) -> usize {
        self.lock().metrics.len()
    }

    /// Ask the worker to stop at its next checkpoint
    ///
    /// Cooperative only: nothing here interrupts the worker thread.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    /// Polled by the worker between units of work
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }
}
