use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("Queue store unreachable: {0}")]
    Connection(String),

    #[error("Queue store timed out: {0}")]
    Timeout(String),

    #[error("Queue store error: {0}")]
    Backend(String),

    #[error("Invalid queue configuration: {0}")]
    Misconfigured(String),
}

impl QueueError {
    /// Whether the store itself is unavailable (as opposed to misused)
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueueError::Connection(_) | QueueError::Timeout(_))
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
