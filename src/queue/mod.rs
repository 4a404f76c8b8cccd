//! Durable FIFO of sealed queue entries
//!
//! Producers push from request handlers; a single relay worker pops.
//! Entries are opaque bytes: the store never sees plaintext.

pub mod error;
pub mod memory;
pub mod redis_queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use memory::MemoryQueue;
pub use redis_queue::{RedisQueue, RedisQueueConfig};
pub use store::QueueStore;
