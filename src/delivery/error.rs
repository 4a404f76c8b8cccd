use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by remote (status {status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("Delivery executor unavailable: {0}")]
    ExecutorUnavailable(String),

    #[error("Invalid delivery configuration: {0}")]
    Misconfigured(String),
}

impl DeliveryError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Transport(_) => "transport",
            DeliveryError::Rejected { .. } => "rejected",
            DeliveryError::Timeout(_) => "timeout",
            DeliveryError::ExecutorUnavailable(_) => "executor",
            DeliveryError::Misconfigured(_) => "config",
        }
    }
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;
