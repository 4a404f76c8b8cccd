use crate::queue::error::QueueResult;
use std::time::Duration;

/// An ordered, persistent FIFO of opaque entries.
///
/// Implementations must be safe for concurrent producers and one consumer
/// without extra locking by the caller.
pub trait QueueStore: Send + Sync {
    /// Append an entry to the tail
    fn push(&self, entry: &[u8]) -> QueueResult<()>;

    /// Remove and return the head, waiting up to `timeout` for one to appear.
    ///
    /// Returns `Ok(None)` when the queue stays empty. Removal is destructive:
    /// there is no redelivery of a popped entry.
    fn pop(&self, timeout: Duration) -> QueueResult<Option<Vec<u8>>>;

    /// Number of entries currently waiting
    fn len(&self) -> QueueResult<usize>;

    fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len()? == 0)
    }
}
