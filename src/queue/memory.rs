//! In-process queue store
//!
//! Same contract as the Redis store minus durability.

use crate::queue::error::QueueResult;
use crate::queue::store::QueueStore;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct MemoryQueue {
    entries: Mutex<VecDeque<Vec<u8>>>,
    available: Condvar,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the waiting entries, head first
    pub fn snapshot(&self) -> Vec<Vec<u8>> {
        self.entries.lock().iter().cloned().collect()
    }
}

impl QueueStore for MemoryQueue {
    fn push(&self, entry: &[u8]) -> QueueResult<()> {
        self.entries.lock().push_back(entry.to_vec());
        self.available.notify_one();
        Ok(())
    }

    fn pop(&self, timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        let mut entries = self.entries.lock();

        loop {
            if let Some(entry) = entries.pop_front() {
                return Ok(Some(entry));
            }
            if self.available.wait_until(&mut entries, deadline).timed_out() {
                return Ok(entries.pop_front());
            }
        }
    }

    fn len(&self) -> QueueResult<usize> {
        Ok(self.entries.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = MemoryQueue::new();
        queue.push(b"e1").unwrap();
        queue.push(b"e2").unwrap();
        queue.push(b"e3").unwrap();

        assert_eq!(queue.pop(Duration::ZERO).unwrap().unwrap(), b"e1");
        assert_eq!(queue.pop(Duration::ZERO).unwrap().unwrap(), b"e2");
        assert_eq!(queue.pop(Duration::ZERO).unwrap().unwrap(), b"e3");
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_empty_pop_waits_for_timeout() {
        let queue = MemoryQueue::new();
        let timeout = Duration::from_millis(150);

        let start = Instant::now();
        assert!(queue.pop(timeout).unwrap().is_none());
        let elapsed = start.elapsed();

        assert!(elapsed >= timeout, "returned after {:?}", elapsed);
        assert!(elapsed < timeout + Duration::from_millis(500));
    }

    #[test]
    fn test_pop_wakes_on_push() {
        let queue = Arc::new(MemoryQueue::new());
        let producer = Arc::clone(&queue);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            producer.push(b"late").unwrap();
        });

        let start = Instant::now();
        let entry = queue.pop(Duration::from_secs(5)).unwrap();
        assert_eq!(entry.unwrap(), b"late");
        assert!(start.elapsed() < Duration::from_secs(5));

        handle.join().unwrap();
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(MemoryQueue::new());
        let handles: Vec<_> = (0..4u8)
            .map(|p| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..25u8 {
                        queue.push(&[p, i]).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len().unwrap(), 100);

        // Per-producer order survives interleaving
        let mut last = [None::<u8>; 4];
        while let Some(entry) = queue.pop(Duration::ZERO).unwrap() {
            let (p, i) = (entry[0] as usize, entry[1]);
            assert!(last[p].map_or(true, |prev| prev < i));
            last[p] = Some(i);
        }
    }
}
