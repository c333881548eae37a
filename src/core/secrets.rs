//! Secrets envelope (spec §6): `state/secrets.enc.json` is an AEAD-sealed
//! map, never the plaintext values. `device` mode keys off a random key
//! held at `<archon_home>/device.key`; `portable` mode derives the key from
//! an operator passphrase through a memory-hard KDF, so the envelope can
//! move between machines without the device key following it.
//!
//! Grounded in the `argon2`-over-passphrase, `aes-gcm`-over-plaintext shape
//! used for deterministic key derivation elsewhere in the pack, adapted here
//! to a single symmetric envelope rather than a key hierarchy.

use crate::core::error::ArchonError;
use crate::core::state_io::StateIO;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const SECRETS_FILE: &str = "state/secrets.enc.json";
const LEGACY_SECRETS_FILE: &str = "state/secrets.json";
const DEVICE_KEY_FILE: &str = "device.key";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Which key source backs the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretMode {
    Device,
    Portable,
}

impl Default for SecretMode {
    fn default() -> Self {
        SecretMode::Device
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncryptedEnvelope {
    mode: SecretMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
    nonce: String,
    ciphertext: String,
}

/// Read the device key, minting and persisting a fresh random one on first
/// use. Shared across every project under the same `archon_home`.
fn device_key(archon_home: &Path) -> Result<[u8; 32], ArchonError> {
    let path = archon_home.join(DEVICE_KEY_FILE);
    if path.exists() {
        let bytes = fs::read(&path).map_err(ArchonError::Io)?;
        if bytes.len() != 32 {
            return Err(ArchonError::Crypto(
                "device.key has unexpected length".to_string(),
            ));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        return Ok(key);
    }

    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, key)
        .map_err(|e| ArchonError::Persistence(format!("writing {}: {e}", path.display())))?;
    Ok(key)
}

fn derive_portable_key(passphrase: &str, salt: &[u8]) -> Result<[u8; 32], ArchonError> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| ArchonError::Crypto(format!("argon2 derivation failed: {e}")))?;
    Ok(key)
}

fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<(Vec<u8>, Vec<u8>), ArchonError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ArchonError::Crypto(format!("invalid key: {e}")))?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| ArchonError::Crypto(format!("encryption failed: {e}")))?;
    Ok((nonce_bytes.to_vec(), ciphertext))
}

fn decrypt(nonce: &[u8], ciphertext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, ArchonError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| ArchonError::Crypto(format!("invalid key: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| ArchonError::Crypto(format!("decryption failed: {e}")))
}

/// Envelope-encrypted secret map, one per project.
pub struct SecretsStore;

impl SecretsStore {
    pub fn new() -> Self {
        Self
    }

    /// Decrypt and return the full secret map, migrating a legacy plaintext
    /// `secrets.json` into the envelope first if one is found and no
    /// envelope yet exists.
    pub fn load(
        &self,
        archon_home: &Path,
        mode: SecretMode,
        passphrase: Option<&str>,
        state: &dyn StateIO,
    ) -> Result<HashMap<String, String>, ArchonError> {
        self.migrate_legacy_if_present(archon_home, mode, passphrase, state)?;
        let envelope: Option<EncryptedEnvelope> = state.read_json(SECRETS_FILE, None)?;
        let Some(envelope) = envelope else {
            return Ok(HashMap::new());
        };
        self.decrypt_envelope(&envelope, archon_home, passphrase)
    }

    fn decrypt_envelope(
        &self,
        envelope: &EncryptedEnvelope,
        archon_home: &Path,
        passphrase: Option<&str>,
    ) -> Result<HashMap<String, String>, ArchonError> {
        let key = self.resolve_key(envelope.mode, archon_home, envelope.salt.as_deref(), passphrase)?;
        let nonce = BASE64
            .decode(&envelope.nonce)
            .map_err(|e| ArchonError::Crypto(format!("invalid nonce encoding: {e}")))?;
        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|e| ArchonError::Crypto(format!("invalid ciphertext encoding: {e}")))?;
        let plaintext = decrypt(&nonce, &ciphertext, &key)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn resolve_key(
        &self,
        mode: SecretMode,
        archon_home: &Path,
        salt_b64: Option<&str>,
        passphrase: Option<&str>,
    ) -> Result<[u8; 32], ArchonError> {
        match mode {
            SecretMode::Device => device_key(archon_home),
            SecretMode::Portable => {
                let passphrase = passphrase
                    .ok_or_else(|| ArchonError::SecretValueRequired("passphrase".to_string()))?;
                let salt_b64 = salt_b64.ok_or_else(|| {
                    ArchonError::Crypto("portable secrets envelope missing salt".to_string())
                })?;
                let salt = BASE64
                    .decode(salt_b64)
                    .map_err(|e| ArchonError::Crypto(format!("invalid salt encoding: {e}")))?;
                derive_portable_key(passphrase, &salt)
            }
        }
    }

    /// Encrypt `secrets` under `mode` and persist the envelope, replacing
    /// any prior one wholesale.
    pub fn save(
        &self,
        archon_home: &Path,
        mode: SecretMode,
        passphrase: Option<&str>,
        secrets: &HashMap<String, String>,
        state: &dyn StateIO,
    ) -> Result<(), ArchonError> {
        let plaintext = serde_json::to_vec(secrets)?;

        let salt = match mode {
            SecretMode::Device => None,
            SecretMode::Portable => {
                let mut salt = [0u8; SALT_LEN];
                OsRng.fill_bytes(&mut salt);
                Some(salt)
            }
        };
        let key = match mode {
            SecretMode::Device => device_key(archon_home)?,
            SecretMode::Portable => {
                let passphrase = passphrase
                    .ok_or_else(|| ArchonError::SecretValueRequired("passphrase".to_string()))?;
                let salt = salt.as_ref().expect("portable mode always generates a salt");
                derive_portable_key(passphrase, salt)?
            }
        };

        let (nonce, ciphertext) = encrypt(&plaintext, &key)?;
        let envelope = EncryptedEnvelope {
            mode,
            salt: salt.map(|s| BASE64.encode(s)),
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
        };
        state.write_json(SECRETS_FILE, &envelope)
    }

    /// `set_secret` commit path: load, insert, re-encrypt, save.
    pub fn set_secret(
        &self,
        archon_home: &Path,
        mode: SecretMode,
        passphrase: Option<&str>,
        name: &str,
        value: &str,
        state: &dyn StateIO,
    ) -> Result<(), ArchonError> {
        let mut secrets = self.load(archon_home, mode, passphrase, state)?;
        secrets.insert(name.to_string(), value.to_string());
        self.save(archon_home, mode, passphrase, &secrets, state)
    }

    /// `delete_secret` commit path. Returns whether the name was present.
    pub fn delete_secret(
        &self,
        archon_home: &Path,
        mode: SecretMode,
        passphrase: Option<&str>,
        name: &str,
        state: &dyn StateIO,
    ) -> Result<bool, ArchonError> {
        let mut secrets = self.load(archon_home, mode, passphrase, state)?;
        let existed = secrets.remove(name).is_some();
        if existed {
            self.save(archon_home, mode, passphrase, &secrets, state)?;
        }
        Ok(existed)
    }

    /// One-shot migration of a legacy plaintext `secrets.json` into the
    /// encrypted envelope. A no-op once an envelope already exists, or if
    /// there is no legacy file to migrate.
    fn migrate_legacy_if_present(
        &self,
        archon_home: &Path,
        mode: SecretMode,
        passphrase: Option<&str>,
        state: &dyn StateIO,
    ) -> Result<(), ArchonError> {
        let existing: Option<EncryptedEnvelope> = state.read_json(SECRETS_FILE, None)?;
        if existing.is_some() {
            return Ok(());
        }
        let legacy: Option<HashMap<String, String>> = state.read_json(LEGACY_SECRETS_FILE, None)?;
        let Some(legacy) = legacy else {
            return Ok(());
        };
        self.save(archon_home, mode, passphrase, &legacy, state)
    }
}
