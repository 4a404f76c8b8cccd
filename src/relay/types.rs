//! Relay worker state and reporting types

use crate::delivery::{DeliveryError, RecipientId};
use std::sync::atomic::{AtomicU64, Ordering};

/// Where the worker loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting on the queue store
    Idle,
    /// Processing one popped entry
    Dispatching,
}

/// Result of one poll/dispatch cycle
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The queue stayed empty for the whole poll timeout
    Idle,
    /// An entry was popped but failed the at-rest integrity check
    Dropped,
    /// An entry was fanned out; per-recipient results inside
    Delivered(DeliveryReport),
}

/// Per-recipient results for one entry
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub delivered: Vec<RecipientId>,
    pub failed: Vec<(RecipientId, DeliveryError)>,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Snapshot of worker counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub entries_dispatched: u64,
    pub entries_dropped: u64,
    pub deliveries_succeeded: u64,
    pub deliveries_failed: u64,
    pub queue_errors: u64,
}

impl std::fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Relay: {} entries dispatched ({} dropped), {} deliveries ok, {} failed, {} queue errors",
            self.entries_dispatched,
            self.entries_dropped,
            self.deliveries_succeeded,
            self.deliveries_failed,
            self.queue_errors
        )
    }
}

#[derive(Default)]
pub(crate) struct WorkerStatsInner {
    pub entries_dispatched: AtomicU64,
    pub entries_dropped: AtomicU64,
    pub deliveries_succeeded: AtomicU64,
    pub deliveries_failed: AtomicU64,
    pub queue_errors: AtomicU64,
}

impl WorkerStatsInner {
    pub fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            entries_dispatched: self.entries_dispatched.load(Ordering::Relaxed),
            entries_dropped: self.entries_dropped.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            queue_errors: self.queue_errors.load(Ordering::Relaxed),
        }
    }
}
