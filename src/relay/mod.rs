//! Store-and-forward relay
//!
//! Two halves joined only by the queue store:
//! - [`SubmissionIntake`] decrypts a submission, seals it and pushes it
//! - [`RelayWorker`] pops sealed entries and delivers them to each recipient
//!
//! Delivery is at-most-once: an entry leaves the queue when it is popped.

pub mod error;
pub mod intake;
pub mod types;
pub mod worker;

pub use error::{SubmitError, WorkerError, WorkerResult};
pub use intake::SubmissionIntake;
pub use types::{DeliveryReport, DispatchOutcome, WorkerState, WorkerStats};
pub use worker::{RelayWorker, WorkerHandle};
