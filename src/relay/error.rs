use crate::crypto::{AtRestError, DecryptionError};
use crate::queue::QueueError;
use thiserror::Error;

/// Why a submission was not queued
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Undecryptable(#[from] DecryptionError),

    #[error("Failed to seal submission: {0}")]
    Seal(#[from] AtRestError),

    #[error("Failed to enqueue submission: {0}")]
    Queue(#[from] QueueError),
}

impl SubmitError {
    /// Label for logs and metrics
    pub fn reason(&self) -> &'static str {
        match self {
            SubmitError::Undecryptable(_) => "undecryptable",
            SubmitError::Seal(_) => "seal",
            SubmitError::Queue(_) => "queue",
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn relay worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Relay worker thread panicked")]
    Panicked,
}

pub type WorkerResult<T> = Result<T, WorkerError>;
