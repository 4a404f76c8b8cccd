//! RSA decryption of inbound submissions
//!
//! Submitters encrypt with the advertised public key using PKCS#1 v1.5
//! padding and post the ciphertext as base64 text.

use crate::crypto::error::{DecryptionError, KeyError, KeyResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use std::fmt;
use std::path::Path;
use zeroize::Zeroizing;

/// UTF-8 text recovered from a submission.
///
/// The buffer is wiped on drop; the message only lives in memory between
/// decryption and sealing, and again during delivery.
pub struct PlaintextMessage(Zeroizing<String>);

impl PlaintextMessage {
    pub fn new(text: String) -> Self {
        Self(Zeroizing::new(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PlaintextMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlaintextMessage({} bytes)", self.0.len())
    }
}

/// Holds the private half of the submission keypair.
pub struct SubmissionDecryptor {
    key: RsaPrivateKey,
    public_pem: String,
}

impl SubmissionDecryptor {
    /// Build from an already parsed private key
    pub fn new(key: RsaPrivateKey) -> KeyResult<Self> {
        let public_pem = key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self { key, public_pem })
    }

    /// Parse a PEM-encoded PKCS#8 private key
    pub fn from_pkcs8_pem(pem: &str) -> KeyResult<Self> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| KeyError::InvalidPrivateKey(e.to_string()))?;
        Self::new(key)
    }

    /// Load a PEM-encoded PKCS#8 private key from disk
    pub fn from_pem_file(path: impl AsRef<Path>) -> KeyResult<Self> {
        let pem = Zeroizing::new(std::fs::read_to_string(path.as_ref())?);
        Self::from_pkcs8_pem(&pem)
    }

    /// SubjectPublicKeyInfo PEM matching this key, for submitters
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    /// Modulus size in bytes; every valid ciphertext has exactly this length
    pub fn ciphertext_len(&self) -> usize {
        self.key.size()
    }

    /// Decrypt a base64-encoded submission.
    ///
    /// ASCII whitespace in the input is ignored. Every failure collapses to
    /// the same [`DecryptionError`].
    pub fn decrypt(&self, submission: &[u8]) -> Result<PlaintextMessage, DecryptionError> {
        let compact: Vec<u8> = submission
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();

        let ciphertext = STANDARD.decode(&compact).map_err(|e| {
            tracing::debug!(stage = "base64", error = %e, "Submission rejected");
            DecryptionError
        })?;

        if ciphertext.len() != self.ciphertext_len() {
            tracing::debug!(
                stage = "length",
                got = ciphertext.len(),
                expected = self.ciphertext_len(),
                "Submission rejected"
            );
            return Err(DecryptionError);
        }

        let decrypted = self
            .key
            .decrypt_blinded(&mut rand::thread_rng(), Pkcs1v15Encrypt, &ciphertext)
            .map(Zeroizing::new)
            .map_err(|_| {
                tracing::debug!(stage = "padding", "Submission rejected");
                DecryptionError
            })?;

        let text = std::str::from_utf8(&decrypted).map_err(|_| {
            tracing::debug!(stage = "utf8", "Submission rejected");
            DecryptionError
        })?;

        Ok(PlaintextMessage::new(text.to_owned()))
    }
}

impl fmt::Debug for SubmissionDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionDecryptor")
            .field("bits", &(self.ciphertext_len() * 8))
            .finish_non_exhaustive()
    }
}
