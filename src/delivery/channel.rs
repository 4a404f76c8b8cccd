//! Synchronous front for the asynchronous transport.
//!
//! Each call is spawned onto the runtime behind `handle`, bounded by
//! `tokio::time::timeout`, and the calling thread blocks on a std channel
//! until the result arrives. The receive side adds a small grace period so a
//! stalled runtime still releases the caller.

use crate::delivery::error::{DeliveryError, DeliveryResult};
use crate::delivery::recipient::RecipientId;
use crate::delivery::transport::DeliveryTransport;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);
const RECV_GRACE: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct DeliveryChannel {
    handle: Handle,
    transport: Arc<dyn DeliveryTransport>,
    timeout: Duration,
}

impl DeliveryChannel {
    pub fn new(handle: Handle, transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            handle,
            transport,
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Deliver `text` to one recipient, blocking the calling thread.
    ///
    /// Must be called from outside the runtime (e.g. the relay worker
    /// thread). Returns within `timeout` plus a small grace period.
    pub fn send(&self, recipient: &RecipientId, text: &str) -> DeliveryResult<()> {
        if Handle::try_current().is_ok() {
            return Err(DeliveryError::ExecutorUnavailable(
                "blocking send called from inside the async runtime".to_string(),
            ));
        }

        let (tx, rx) = mpsc::sync_channel(1);
        let transport = Arc::clone(&self.transport);
        let recipient_id = recipient.clone();
        let text = text.to_owned();
        let timeout = self.timeout;
        let started = Instant::now();

        self.handle.spawn(async move {
            let outcome = match tokio::time::timeout(timeout, transport.send(&recipient_id, &text))
                .await
            {
                Ok(result) => result,
                Err(_elapsed) => Err(DeliveryError::Timeout(timeout)),
            };
            // Receiver may already have given up
            let _ = tx.send(outcome);
        });

        let outcome = match rx.recv_timeout(timeout + RECV_GRACE) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => Err(DeliveryError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(DeliveryError::ExecutorUnavailable(
                "runtime dropped the delivery task".to_string(),
            )),
        };

        let outcome_label = match &outcome {
            Ok(()) => "delivered",
            Err(e) => e.kind(),
        };
        crate::metrics::record_delivery(outcome_label, started.elapsed());

        outcome
    }
}

impl std::fmt::Debug for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryChannel")
            .field("transport", &self.transport.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// Records every attempt; fails for listed recipients, stalls for others
    #[derive(Default)]
    pub struct RecordingTransport {
        pub attempts: Mutex<Vec<(RecipientId, String)>>,
        pub failing: HashSet<String>,
        pub stalling: HashSet<String>,
    }

    impl RecordingTransport {
        pub fn failing_for(ids: &[&str]) -> Self {
            Self {
                failing: ids.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn stalling_for(ids: &[&str]) -> Self {
            Self {
                stalling: ids.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn attempts_for(&self, id: &str) -> Vec<String> {
            self.attempts
                .lock()
                .iter()
                .filter(|(r, _)| r.as_str() == id)
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    impl DeliveryTransport for RecordingTransport {
        fn send<'a>(
            &'a self,
            recipient: &'a RecipientId,
            text: &'a str,
        ) -> BoxFuture<'a, DeliveryResult<()>> {
            async move {
                self.attempts
                    .lock()
                    .push((recipient.clone(), text.to_string()));
                if self.stalling.contains(recipient.as_str()) {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                if self.failing.contains(recipient.as_str()) {
                    return Err(DeliveryError::Transport("connection reset".to_string()));
                }
                Ok(())
            }
            .boxed()
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }
}
