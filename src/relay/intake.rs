//! Submission intake: decrypt, re-seal, enqueue.
//!
//! Plaintext exists only between the decrypt and seal steps and is wiped
//! on drop. Nothing derived from it is logged.

use crate::crypto::{AtRestCipher, SubmissionDecryptor};
use crate::metrics;
use crate::queue::{QueueResult, QueueStore};
use crate::relay::error::SubmitError;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SubmissionIntake {
    decryptor: SubmissionDecryptor,
    cipher: Arc<AtRestCipher>,
    queue: Arc<dyn QueueStore>,
}

impl SubmissionIntake {
    pub fn new(
        decryptor: SubmissionDecryptor,
        cipher: Arc<AtRestCipher>,
        queue: Arc<dyn QueueStore>,
    ) -> Self {
        Self {
            decryptor,
            cipher,
            queue,
        }
    }

    /// PEM the browser encrypts submissions with
    pub fn public_key_pem(&self) -> &str {
        self.decryptor.public_key_pem()
    }

    /// Entries waiting for the relay worker. Blocking.
    pub fn queue_depth(&self) -> QueueResult<usize> {
        self.queue.len()
    }

    /// Accept one base64 ciphertext.
    ///
    /// Blocking: performs an RSA decryption and a queue round trip.
    pub fn accept(&self, submission: &[u8]) -> Result<(), SubmitError> {
        let result = self.seal_and_enqueue(submission);

        match &result {
            Ok(()) => {
                metrics::record_submission_accepted();
                info!("Submission queued");
            }
            Err(SubmitError::Undecryptable(_)) => {
                metrics::record_submission_rejected("undecryptable");
                debug!(len = submission.len(), "Rejected undecryptable submission");
            }
            Err(e) => {
                metrics::record_submission_rejected(e.reason());
                warn!("Failed to queue submission: {}", e);
            }
        }

        result
    }

    fn seal_and_enqueue(&self, submission: &[u8]) -> Result<(), SubmitError> {
        let plaintext = self.decryptor.decrypt(submission)?;
        let sealed = self.cipher.seal(plaintext.as_bytes())?;
        drop(plaintext);

        self.queue.push(&sealed)?;
        Ok(())
    }
}
