//! Redis-backed queue store.
//!
//! One named list used strictly as FIFO:
//! - Push: `LPUSH key entry`
//! - Pop: `BRPOP key <secs>` (native blocking pop, no client-side polling)
//! - Length: `LLEN key`
//!
//! A zero pop timeout falls back to `RPOP`, because `BRPOP` treats zero as
//! "block forever". Other pop timeouts are rounded up to whole seconds.
//!
//! Connections are opened lazily and reused: one for short commands, one for
//! blocking pops. A connection that fails at the IO level is dropped and
//! reopened on the next call.

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::store::QueueStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_QUEUE_KEY: &str = "sealed-relay:submissions";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisQueueConfig {
    /// e.g. `redis://127.0.0.1:6379/0`
    pub url: String,

    /// Name of the list holding entries
    pub key: String,

    /// Connect/write timeout, also added on top of the pop timeout for reads
    pub io_timeout_ms: u64,
}

impl Default for RedisQueueConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            key: DEFAULT_QUEUE_KEY.to_string(),
            io_timeout_ms: 2_000,
        }
    }
}

impl RedisQueueConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms.max(1))
    }

    pub fn validate(&self) -> QueueResult<()> {
        if self.url.trim().is_empty() {
            return Err(QueueError::Misconfigured("redis url is empty".to_string()));
        }
        if self.key.trim().is_empty() {
            return Err(QueueError::Misconfigured("queue key is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct RedisQueue {
    backend: Arc<dyn ListBackend>,
    key: String,
}

impl RedisQueue {
    /// Open a client and verify the server answers `PING`
    pub fn connect(config: &RedisQueueConfig) -> QueueResult<Self> {
        config.validate()?;
        let backend = Arc::new(RealRedisBackend::open(&config.url, config.io_timeout())?);
        backend.ping()?;

        tracing::info!(key = %config.key, "Connected to redis queue store");

        Ok(Self {
            backend,
            key: config.key.clone(),
        })
    }

    #[cfg(test)]
    fn for_test(backend: Arc<dyn ListBackend>, key: &str) -> Self {
        Self {
            backend,
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisQueue").field("key", &self.key).finish()
    }
}

impl QueueStore for RedisQueue {
    fn push(&self, entry: &[u8]) -> QueueResult<()> {
        self.backend.lpush(&self.key, entry)
    }

    fn pop(&self, timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        if timeout.is_zero() {
            self.backend.rpop(&self.key)
        } else {
            self.backend.brpop(&self.key, timeout)
        }
    }

    fn len(&self) -> QueueResult<usize> {
        self.backend.llen(&self.key)
    }
}

trait ListBackend: Send + Sync + 'static {
    fn ping(&self) -> QueueResult<()>;
    fn lpush(&self, key: &str, value: &[u8]) -> QueueResult<()>;
    fn rpop(&self, key: &str) -> QueueResult<Option<Vec<u8>>>;
    fn brpop(&self, key: &str, timeout: Duration) -> QueueResult<Option<Vec<u8>>>;
    fn llen(&self, key: &str) -> QueueResult<usize>;
}

/// Cached connection slot; emptied after any error that may leave the
/// socket out of sync with the server
type ConnSlot = Mutex<Option<redis::Connection>>;

struct RealRedisBackend {
    client: redis::Client,
    io_timeout: Duration,
    /// Short commands from any producer
    commands: ConnSlot,
    /// BRPOP only, so a blocked pop never holds up a push
    blocking: ConnSlot,
}

impl RealRedisBackend {
    fn open(url: &str, io_timeout: Duration) -> QueueResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| QueueError::Misconfigured(e.to_string()))?;
        Ok(Self {
            client,
            io_timeout,
            commands: Mutex::new(None),
            blocking: Mutex::new(None),
        })
    }

    fn with_conn<T>(
        &self,
        slot: &ConnSlot,
        read_timeout: Duration,
        f: impl FnOnce(&mut redis::Connection) -> redis::RedisResult<T>,
    ) -> QueueResult<T> {
        let mut cached = slot.lock();

        let mut conn = match cached.take() {
            Some(conn) => conn,
            None => self.connect()?,
        };

        let result = conn
            .set_read_timeout(Some(read_timeout))
            .and_then(|()| f(&mut conn))
            .map_err(map_redis_err);

        match &result {
            // Dropped here, reopened on next use
            Err(e) if e.is_unavailable() => {}
            _ => *cached = Some(conn),
        }
        result
    }

    fn connect(&self) -> QueueResult<redis::Connection> {
        let conn = self
            .client
            .get_connection_with_timeout(self.io_timeout)
            .map_err(map_redis_err)?;
        conn.set_write_timeout(Some(self.io_timeout))
            .map_err(map_redis_err)?;
        tracing::debug!("Opened redis connection");
        Ok(conn)
    }
}

impl ListBackend for RealRedisBackend {
    fn ping(&self) -> QueueResult<()> {
        self.with_conn(&self.commands, self.io_timeout, |c| {
            redis::cmd("PING").query::<String>(c)
        })?;
        Ok(())
    }

    fn lpush(&self, key: &str, value: &[u8]) -> QueueResult<()> {
        let _len: i64 = self.with_conn(&self.commands, self.io_timeout, |c| {
            redis::cmd("LPUSH").arg(key).arg(value).query(c)
        })?;
        Ok(())
    }

    fn rpop(&self, key: &str) -> QueueResult<Option<Vec<u8>>> {
        self.with_conn(&self.commands, self.io_timeout, |c| {
            redis::cmd("RPOP").arg(key).query(c)
        })
    }

    fn brpop(&self, key: &str, timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        let secs = brpop_seconds(timeout);
        // The socket must outlive the server-side block
        let read_timeout = Duration::from_secs(secs) + self.io_timeout;
        let popped: Option<(String, Vec<u8>)> =
            self.with_conn(&self.blocking, read_timeout, |c| {
                redis::cmd("BRPOP").arg(key).arg(secs).query(c)
            })?;
        Ok(popped.map(|(_key, value)| value))
    }

    fn llen(&self, key: &str) -> QueueResult<usize> {
        self.with_conn(&self.commands, self.io_timeout, |c| {
            redis::cmd("LLEN").arg(key).query(c)
        })
    }
}

/// Whole seconds for `BRPOP`, rounded up and never zero.
///
/// Servers before 6.0 reject fractional timeouts.
fn brpop_seconds(timeout: Duration) -> u64 {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    secs.max(1)
}

fn map_redis_err(e: redis::RedisError) -> QueueError {
    let msg = e.to_string();
    if e.is_timeout() {
        return QueueError::Timeout(msg);
    }
    if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
        return QueueError::Connection(msg);
    }
    let m = msg.to_ascii_lowercase();
    if m.contains("timed out") || m.contains("timeout") {
        return QueueError::Timeout(msg);
    }
    if m.contains("connection") || m.contains("broken pipe") {
        return QueueError::Connection(msg);
    }
    QueueError::Backend(msg)
}

// ===== tests (no real redis required) =====

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(test)]
use parking_lot::Condvar;

#[cfg(test)]
#[derive(Default)]
struct FakeRedisBackend {
    lists: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
    pushed: Condvar,
    down: AtomicBool,
}

#[cfg(test)]
impl FakeRedisBackend {
    fn check_up(&self) -> QueueResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(map_redis_err(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))));
        }
        Ok(())
    }
}

#[cfg(test)]
impl ListBackend for FakeRedisBackend {
    fn ping(&self) -> QueueResult<()> {
        self.check_up()
    }

    fn lpush(&self, key: &str, value: &[u8]) -> QueueResult<()> {
        self.check_up()?;
        let mut lists = self.lists.lock();
        lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_vec());
        self.pushed.notify_all();
        Ok(())
    }

    fn rpop(&self, key: &str) -> QueueResult<Option<Vec<u8>>> {
        self.check_up()?;
        let mut lists = self.lists.lock();
        Ok(lists.get_mut(key).and_then(|list| list.pop_back()))
    }

    fn brpop(&self, key: &str, timeout: Duration) -> QueueResult<Option<Vec<u8>>> {
        self.check_up()?;
        let deadline = std::time::Instant::now() + timeout;
        let mut lists = self.lists.lock();
        loop {
            if let Some(value) = lists.get_mut(key).and_then(|list| list.pop_back()) {
                return Ok(Some(value));
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.pushed.wait_for(&mut lists, deadline - now);
        }
    }

    fn llen(&self, key: &str) -> QueueResult<usize> {
        self.check_up()?;
        let lists = self.lists.lock();
        Ok(lists.get(key).map_or(0, VecDeque::len))
    }
}
