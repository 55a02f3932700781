//! Plaintext JSON key files.
//!
//! The secret key is stored unencrypted. The file is created owner-readable only on unix.
use anyhow::{Context, Result, ensure};
use evm_vrf::{SecretKey, evm::parse_word_hex};
use serde::{Deserialize, Serialize};
use std::{fs, io::Write, path::Path};

/// What `gen-vrf-key` writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyFile {
    /// `0x` prefixed hex.
    pub secret_key: String,
    /// Compressed public key, which is also the keystore id.
    pub public_key: String,
    /// See [`PublicKey::key_hash`](evm_vrf::PublicKey::key_hash).
    pub key_hash: String,
}

impl KeyFile {
    /// The key file for `key`.
    pub fn new(key: &SecretKey) -> Result<Self> {
        let public_key = key.public_key();
        Ok(Self {
            secret_key: format!("0x{}", hex::encode(key.to_bytes())),
            public_key: public_key.id()?,
            key_hash: public_key.key_hash()?.to_string(),
        })
    }

    /// The secret key, after checking the public parts agree with it.
    pub fn secret_key(&self) -> Result<SecretKey> {
        let key = SecretKey::from_bytes(parse_word_hex(&self.secret_key)?)?;
        ensure!(
            key.public_key().id()? == self.public_key.to_ascii_lowercase(),
            "public key in key file does not match its secret key"
        );
        Ok(key)
    }
}

/// Writes `key` to `path`. Refuses to replace an existing file unless `force` is set.
pub fn write_key_file(path: &Path, key: &SecretKey, force: bool) -> Result<KeyFile> {
    let key_file = KeyFile::new(key)?;
    let mut options = fs::OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("creating key file {}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, &key_file)?;
    file.write_all(b"\n")?;
    Ok(key_file)
}

/// Reads a file written by [`write_key_file`].
pub fn read_key_file(path: &Path) -> Result<SecretKey> {
    let contents = fs::read(path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    let key_file: KeyFile = serde_json::from_slice(&contents)
        .with_context(|| format!("parsing key file {}", path.display()))?;
    key_file.secret_key()
}
