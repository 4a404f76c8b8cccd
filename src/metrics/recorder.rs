//! Metrics recorder for relay operations
//!
//! Thin wrappers over the `metrics` macros so metric names live in one place.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!(
        "relay_submissions_accepted_total",
        "Submissions decrypted, sealed and queued"
    );
    describe_counter!(
        "relay_submissions_rejected_total",
        "Submissions refused at intake, by reason"
    );
    describe_counter!(
        "relay_entries_dispatched_total",
        "Queue entries opened and fanned out to recipients"
    );
    describe_counter!(
        "relay_entries_dropped_total",
        "Queue entries discarded after failing the integrity check"
    );
    describe_counter!(
        "relay_deliveries_total",
        "Per-recipient delivery attempts, by outcome"
    );
    describe_counter!(
        "relay_queue_errors_total",
        "Queue store failures seen by the relay worker"
    );

    describe_histogram!(
        "relay_delivery_duration_seconds",
        "Wall time of a single per-recipient delivery"
    );
}

// ============== Intake ==============

pub fn record_submission_accepted() {
    counter!("relay_submissions_accepted_total").increment(1);
}

pub fn record_submission_rejected(reason: &'static str) {
    counter!("relay_submissions_rejected_total", "reason" => reason).increment(1);
}

// ============== Worker ==============

pub fn record_entry_dispatched() {
    counter!("relay_entries_dispatched_total").increment(1);
}

pub fn record_entry_dropped() {
    counter!("relay_entries_dropped_total").increment(1);
}

pub fn record_queue_error() {
    counter!("relay_queue_errors_total").increment(1);
}

// ============== Delivery ==============

/// Record one per-recipient attempt; `outcome` is "delivered" or an error kind
pub fn record_delivery(outcome: &'static str, duration: Duration) {
    counter!("relay_deliveries_total", "outcome" => outcome).increment(1);
    histogram!("relay_delivery_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}
