//! Authenticated encryption for queue entries
//!
//! Token layout: `version (1) || nonce (24) || ciphertext+tag`.
//! XChaCha20-Poly1305 with a random nonce per entry, bound to a fixed
//! associated-data label so tokens from other systems sharing the key
//! cannot be replayed into the queue.

use crate::crypto::error::{AtRestError, AtRestResult};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::io::Write;
use std::path::Path;
use zeroize::Zeroizing;

/// Length of the raw at-rest key file
pub const AT_REST_KEY_LEN: usize = 32;

const TOKEN_VERSION: u8 = 0x01;
const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;
const AAD: &[u8] = b"sealed-relay/queue-entry/v1";

pub struct AtRestCipher {
    key: Zeroizing<[u8; AT_REST_KEY_LEN]>,
}

impl AtRestCipher {
    pub fn new(key: [u8; AT_REST_KEY_LEN]) -> Self {
        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Fresh random key, not persisted anywhere
    pub fn generate() -> Self {
        let mut key = [0u8; AT_REST_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self::new(key)
    }

    /// Load the key file, creating it on first run.
    ///
    /// Losing this file makes every entry still in the queue unreadable.
    pub fn load_or_generate(path: impl AsRef<Path>) -> AtRestResult<Self> {
        let path = path.as_ref();

        match std::fs::read(path) {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                let key: [u8; AT_REST_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
                    AtRestError::InvalidKey(format!(
                        "{} holds {} bytes, expected {}",
                        path.display(),
                        bytes.len(),
                        AT_REST_KEY_LEN
                    ))
                })?;
                tracing::debug!(path = %path.display(), "Loaded at-rest key");
                Ok(Self::new(key))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cipher = Self::generate();
                cipher.persist(path)?;
                tracing::info!(path = %path.display(), "Generated new at-rest key");
                Ok(cipher)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, path: &Path) -> AtRestResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        file.write_all(self.key.as_slice())?;
        file.sync_all()?;
        Ok(())
    }

    /// Encrypt a plaintext into a queue entry token
    pub fn seal(&self, plaintext: &[u8]) -> AtRestResult<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .aead()
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: AAD,
                },
            )
            .map_err(|_| AtRestError::Seal)?;

        let mut token = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        token.push(TOKEN_VERSION);
        token.extend_from_slice(&nonce);
        token.extend_from_slice(&ciphertext);
        Ok(token)
    }

    /// Decrypt a queue entry token; any corruption is [`AtRestError::Integrity`]
    pub fn open(&self, token: &[u8]) -> AtRestResult<Vec<u8>> {
        if token.len() < 1 + NONCE_LEN + TAG_LEN || token[0] != TOKEN_VERSION {
            return Err(AtRestError::Integrity);
        }

        let (nonce, ciphertext) = token[1..].split_at(NONCE_LEN);

        self.aead()
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: AAD,
                },
            )
            .map_err(|_| AtRestError::Integrity)
    }

    fn aead(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(self.key.as_slice()))
    }
}

impl fmt::Debug for AtRestCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AtRestCipher(..)")
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn seal_open_round_trip(plaintext in vec(any::<u8>(), 0..200)) {
            let cipher = AtRestCipher::generate();
            let token = cipher.seal(&plaintext).unwrap();

            prop_assert_eq!(cipher.open(&token).unwrap(), plaintext);
        }

        #[test]
        fn truncated_token_fails_integrity(
            plaintext in vec(any::<u8>(), 0..200),
            cut in any::<prop::sample::Index>()
        ) {
            let cipher = AtRestCipher::generate();
            let token = cipher.seal(&plaintext).unwrap();
            let keep = cut.index(token.len());

            prop_assert!(matches!(cipher.open(&token[..keep]), Err(AtRestError::Integrity)));
        }
    }
}
