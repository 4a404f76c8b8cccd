//! Relay worker: pops sealed entries and fans them out to recipients.
//!
//! Runs on its own OS thread. Each cycle blocks on the queue store for at
//! most the poll timeout, opens the popped entry and sends it to every
//! recipient through the blocking [`DeliveryChannel`]. An entry is consumed
//! by the pop; a failed delivery is logged and not retried.

use crate::config::{QueueBackoffConfig, RelayConfig};
use crate::crypto::AtRestCipher;
use crate::delivery::{DeliveryChannel, RecipientSet};
use crate::metrics;
use crate::queue::{QueueResult, QueueStore};
use crate::relay::error::{WorkerError, WorkerResult};
use crate::relay::types::{
    DeliveryReport, DispatchOutcome, WorkerState, WorkerStats, WorkerStatsInner,
};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Granularity of shutdown checks while backing off
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

pub struct RelayWorker {
    queue: Arc<dyn QueueStore>,
    cipher: Arc<AtRestCipher>,
    channel: DeliveryChannel,
    recipients: RecipientSet,
    config: Arc<RelayConfig>,
    state: Arc<RwLock<WorkerState>>,
    stats: Arc<WorkerStatsInner>,
    shutdown: Arc<AtomicBool>,
}

impl RelayWorker {
    pub fn new(
        queue: Arc<dyn QueueStore>,
        cipher: Arc<AtRestCipher>,
        channel: DeliveryChannel,
        config: Arc<RelayConfig>,
    ) -> Self {
        Self {
            queue,
            cipher,
            channel,
            recipients: config.recipient_set(),
            config,
            state: Arc::new(RwLock::new(WorkerState::Idle)),
            stats: Arc::new(WorkerStatsInner::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.snapshot()
    }

    pub fn recipients(&self) -> &RecipientSet {
        &self.recipients
    }

    /// One poll/dispatch cycle.
    ///
    /// Returns `Err` only when the queue store itself fails; delivery
    /// failures are reported inside [`DispatchOutcome::Delivered`].
    pub fn run_once(&self) -> QueueResult<DispatchOutcome> {
        self.set_state(WorkerState::Idle);

        let entry = self
            .queue
            .pop(self.config.poll_timeout())
            .map_err(|e| {
                self.stats.queue_errors.fetch_add(1, Ordering::Relaxed);
                metrics::record_queue_error();
                e
            })?;

        let Some(entry) = entry else {
            return Ok(DispatchOutcome::Idle);
        };

        self.set_state(WorkerState::Dispatching);
        let outcome = self.dispatch(&entry);
        self.set_state(WorkerState::Idle);

        Ok(outcome)
    }

    fn dispatch(&self, entry: &[u8]) -> DispatchOutcome {
        let plaintext = match self.cipher.open(entry) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) => {
                warn!(entry_len = entry.len(), error = %e, "Dropping queue entry");
                self.record_dropped();
                return DispatchOutcome::Dropped;
            }
        };

        // Intake only seals valid UTF-8
        let Ok(plaintext) = std::str::from_utf8(&plaintext) else {
            warn!(entry_len = entry.len(), "Dropping queue entry with non-UTF-8 payload");
            self.record_dropped();
            return DispatchOutcome::Dropped;
        };

        let text = Zeroizing::new(self.config.format_message(plaintext));
        let mut report = DeliveryReport::default();

        for recipient in &self.recipients {
            let started = Instant::now();
            match self.channel.send(recipient, &text) {
                Ok(()) => {
                    debug!(
                        recipient = %recipient,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Delivered"
                    );
                    self.stats
                        .deliveries_succeeded
                        .fetch_add(1, Ordering::Relaxed);
                    report.delivered.push(recipient.clone());
                }
                Err(e) => {
                    warn!(recipient = %recipient, kind = e.kind(), error = %e, "Delivery failed");
                    self.stats.deliveries_failed.fetch_add(1, Ordering::Relaxed);
                    report.failed.push((recipient.clone(), e));
                }
            }
        }

        self.stats.entries_dispatched.fetch_add(1, Ordering::Relaxed);
        metrics::record_entry_dispatched();
        info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Dispatched queue entry"
        );

        DispatchOutcome::Delivered(report)
    }

    /// Loop until shutdown is requested, backing off while the queue fails
    pub fn run(&self) {
        let mut backoff = queue_backoff(&self.config.queue_backoff);
        info!(
            recipients = self.recipients.len(),
            transport = self.channel.transport_name(),
            "Relay worker started"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.run_once() {
                Ok(_) => backoff.reset(),
                Err(e) => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(self.config.queue_backoff.max_interval());
                    warn!("Queue pop failed, retrying in {:?}: {}", delay, e);
                    self.sleep_unless_shutdown(delay);
                }
            }
        }

        self.set_state(WorkerState::Idle);
        info!("{}", self.stats());
    }

    /// Move the worker onto a dedicated thread
    pub fn spawn(self) -> WorkerResult<WorkerHandle> {
        let state = Arc::clone(&self.state);
        let stats = Arc::clone(&self.stats);
        let shutdown = Arc::clone(&self.shutdown);

        let thread = thread::Builder::new()
            .name("relay-worker".to_string())
            .spawn(move || self.run())?;

        Ok(WorkerHandle {
            thread: Some(thread),
            state,
            stats,
            shutdown,
        })
    }

    fn sleep_unless_shutdown(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SHUTDOWN_POLL));
        }
    }

    fn record_dropped(&self) {
        self.stats.entries_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_entry_dropped();
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.write() = state;
    }
}

fn queue_backoff(config: &QueueBackoffConfig) -> ExponentialBackoff {
    let mut backoff = ExponentialBackoff {
        initial_interval: config.initial_interval(),
        current_interval: config.initial_interval(),
        max_interval: config.max_interval(),
        max_elapsed_time: None,
        ..Default::default()
    };
    backoff.reset();
    backoff
}

/// Handle to a worker running on its own thread
pub struct WorkerHandle {
    thread: Option<JoinHandle<()>>,
    state: Arc<RwLock<WorkerState>>,
    stats: Arc<WorkerStatsInner>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop after the current cycle and wait for the thread.
    ///
    /// Blocks for up to one poll timeout plus any in-flight deliveries.
    pub fn shutdown(mut self) -> WorkerResult<WorkerStats> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| WorkerError::Panicked)?;
        }
        Ok(self.stats.snapshot())
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
