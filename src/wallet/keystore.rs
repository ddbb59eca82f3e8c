use crate::error::{NodeError, Result};
use crate::utils::{hex_decode, hex_encode};
use log::{info, warn};
use secp256k1::rand::rngs::OsRng;
use secp256k1::{Secp256k1, SecretKey};
use std::fs;
use std::path::{Path, PathBuf};

/// The key provider: one hex-encoded secp256k1 private key at a filesystem
/// path. Generated and written on first use, loaded on every run after
/// that. The core never rewrites an existing key.
pub struct Keystore {
    path: PathBuf,
}

impl Keystore {
    pub fn new<P: AsRef<Path>>(path: P) -> Keystore {
        Keystore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn get_path(&self) -> &Path {
        self.path.as_path()
    }

    /// Load the private key, generating and persisting a fresh one when the
    /// file does not exist yet.
    pub fn load_or_generate(&self) -> Result<SecretKey> {
        if self.path.exists() {
            return self.load();
        }

        let secp = Secp256k1::new();
        let (secret_key, _public_key) = secp.generate_keypair(&mut OsRng);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| NodeError::Io(format!("Failed to create key directory: {e}")))?;
        }
        fs::write(&self.path, hex_encode(&secret_key.secret_bytes()))
            .map_err(|e| NodeError::Io(format!("Failed to write private key: {e}")))?;
        info!("Generated new private key at {}", self.path.display());
        Ok(secret_key)
    }

    fn load(&self) -> Result<SecretKey> {
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| NodeError::Io(format!("Failed to read private key: {e}")))?;
        let bytes = hex_decode(contents.trim())?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| NodeError::Crypto(format!("Invalid private key material: {e}")))?;
        info!("Loaded private key from {}", self.path.display());
        Ok(secret_key)
    }

    /// Remove the key file. Exposed for tests.
    pub fn delete(&self) -> Result<()> {
        if !self.path.exists() {
            warn!("No key file to delete at {}", self.path.display());
            return Ok(());
        }
        fs::remove_file(&self.path)
            .map_err(|e| NodeError::Io(format!("Failed to delete private key: {e}")))
    }
}
