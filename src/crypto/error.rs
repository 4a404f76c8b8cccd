use thiserror::Error;

/// Failure to turn a submission into plaintext.
///
/// Carries no cause: malformed encoding, a wrong ciphertext
/// length, bad padding and non-UTF-8 output must be indistinguishable to
/// whoever submitted the payload.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unable to decrypt submission")]
pub struct DecryptionError;

#[derive(Error, Debug)]
pub enum AtRestError {
    #[error("Queue entry failed integrity check")]
    Integrity,

    #[error("Failed to seal queue entry")]
    Seal,

    #[error("Invalid at-rest key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AtRestResult<T> = Result<T, AtRestError>;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Key generation failed: {0}")]
    Generation(String),

    #[error("Refusing to overwrite existing key file: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type KeyResult<T> = Result<T, KeyError>;
