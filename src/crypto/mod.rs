//! Key material and ciphers for the submission pipeline
//!
//! Two independent primitives live here:
//! - the asymmetric decryptor that opens browser-encrypted submissions
//! - the at-rest cipher that seals plaintext before it reaches the queue store

pub mod at_rest;
pub mod decryptor;
pub mod error;
pub mod keys;

pub use at_rest::{AtRestCipher, AT_REST_KEY_LEN};
pub use decryptor::{PlaintextMessage, SubmissionDecryptor};
pub use error::{AtRestError, AtRestResult, DecryptionError, KeyError, KeyResult};
pub use keys::{generate_keypair, write_keypair, KeyPairPem};
