//! Metrics and observability module
//!
//! Key metrics exposed:
//! - Submissions accepted and rejected at intake
//! - Queue entries dispatched and dropped by the worker
//! - Per-recipient delivery outcomes and latency
//! - Queue store errors

pub mod exporter;
pub mod recorder;

pub use exporter::{metrics_route, render_metrics, start_metrics_server, MetricsError};
pub use recorder::{
    init_metrics, record_delivery, record_entry_dispatched, record_entry_dropped,
    record_queue_error, record_submission_accepted, record_submission_rejected,
};
