//! Submission keypair generation

use crate::crypto::error::{KeyError, KeyResult};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use std::io::Write;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

pub const PRIVATE_KEY_FILE: &str = "private_key.pem";
pub const PUBLIC_KEY_FILE: &str = "public_key.pem";

/// PEM encodings of a freshly generated keypair
pub struct KeyPairPem {
    /// PKCS#8, unencrypted
    pub private_pem: Zeroizing<String>,
    /// SubjectPublicKeyInfo
    pub public_pem: String,
}

pub fn generate_keypair(bits: usize) -> KeyResult<KeyPairPem> {
    let key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
        .map_err(|e| KeyError::Generation(e.to_string()))?;

    let private_pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeyError::Generation(e.to_string()))?;
    let public_pem = key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeyError::Generation(e.to_string()))?;

    Ok(KeyPairPem {
        private_pem,
        public_pem,
    })
}

/// Generate a keypair and write both halves into `dir`.
///
/// Existing key files are never overwritten. Returns the paths of the
/// private and public key files.
pub fn write_keypair(dir: impl AsRef<Path>, bits: usize) -> KeyResult<(PathBuf, PathBuf)> {
    let dir = dir.as_ref();
    let private_path = dir.join(PRIVATE_KEY_FILE);
    let public_path = dir.join(PUBLIC_KEY_FILE);

    for path in [&private_path, &public_path] {
        if path.exists() {
            return Err(KeyError::AlreadyExists(path.display().to_string()));
        }
    }

    std::fs::create_dir_all(dir)?;
    let pair = generate_keypair(bits)?;

    write_new(&private_path, pair.private_pem.as_bytes(), 0o600)?;
    write_new(&public_path, pair.public_pem.as_bytes(), 0o644)?;

    tracing::info!(
        private = %private_path.display(),
        public = %public_path.display(),
        bits,
        "Wrote submission keypair"
    );

    Ok((private_path, public_path))
}

fn write_new(path: &Path, contents: &[u8], mode: u32) -> KeyResult<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            KeyError::AlreadyExists(path.display().to_string())
        } else {
            KeyError::Io(e)
        }
    })?;
    file.write_all(contents)?;
    file.sync_all()?;
    Ok(())
}
