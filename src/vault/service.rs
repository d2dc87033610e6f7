//! Credential Vault
//!
//! Keeps one sealed SSH key per client context.
//!
//! # Responsibilities
//!
//! - Seal and persist a key under a user passphrase
//! - Answer "is a key configured" without touching the cipher
//! - Clear the slot when credentials are rotated
//! - Open the stored envelope for the credential resolver

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::crypto::{open_async, seal_async};
use super::secret::{Passphrase, SecretKey};
use super::store::KeyValueStore;
use crate::types::{Result, WicketError};

/// Storage key of the single credential slot.
pub const RECORD_KEY: &str = "ssh_key_record";

// =============================================================================
// Credential Record
// =============================================================================

/// Persisted, non-secret metadata plus the sealed key.
///
/// Stored as one JSON value so replacing it is a single atomic `set`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Human-readable label (usually the original key file name)
    pub label: String,

    /// Base64 envelope from the envelope cipher
    pub envelope: String,

    /// When the record was written (RFC 3339)
    pub saved_at: String,
}

// =============================================================================
// Credential Vault
// =============================================================================

/// Sealed storage for the SSH private key.
#[derive(Clone)]
pub struct CredentialVault {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Seal `plaintext_key` under `passphrase` and replace the stored record.
    ///
    /// The plaintext is owned by the sealing task and zeroized when it
    /// finishes; the vault keeps no copy. Sealing runs on the blocking pool.
    pub async fn save_key(
        &self,
        label: &str,
        plaintext_key: SecretKey,
        passphrase: Passphrase,
    ) -> Result<CredentialRecord> {
        let label = label.trim();
        if label.is_empty() {
            return Err(WicketError::InvalidInput("Key label must not be empty".into()));
        }
        if plaintext_key.is_empty() {
            return Err(WicketError::InvalidInput("SSH key must not be empty".into()));
        }
        if passphrase.is_empty() {
            return Err(WicketError::PassphraseRequired);
        }

        let envelope = seal_async(plaintext_key, passphrase).await?;

        let record = CredentialRecord {
            label: label.to_string(),
            envelope,
            saved_at: chrono::Utc::now().to_rfc3339(),
        };
        let body = serde_json::to_string(&record)?;
        self.store.set(RECORD_KEY, &body)?;

        info!(label = %record.label, "Saved sealed SSH key");
        Ok(record)
    }

    /// Whether a sealed key is configured.
    pub fn has_stored_key(&self) -> Result<bool> {
        Ok(self.store.get(RECORD_KEY)?.is_some())
    }

    /// Label of the stored key, if any.
    pub fn stored_label(&self) -> Result<Option<String>> {
        Ok(self.load_record()?.map(|record| record.label))
    }

    /// Load the stored record without decrypting it.
    pub fn load_record(&self) -> Result<Option<CredentialRecord>> {
        let Some(body) = self.store.get(RECORD_KEY)? else {
            return Ok(None);
        };

        // An unreadable record cannot be told apart from a bad envelope.
        let record = serde_json::from_str(&body).map_err(|_| WicketError::DecryptionFailed)?;
        Ok(Some(record))
    }

    /// Remove the stored record. Irreversible.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(RECORD_KEY)?;
        info!("Cleared stored SSH key");
        Ok(())
    }

    /// Open the stored envelope with `passphrase`.
    ///
    /// Only the credential resolver should call this.
    pub(crate) async fn open_stored(&self, passphrase: Passphrase) -> Result<SecretKey> {
        let record = self
            .load_record()?
            .ok_or(WicketError::MissingCredential)?;

        let key = open_async(record.envelope, passphrase).await?;
        debug!(label = %record.label, "Opened stored SSH key");
        Ok(key)
    }
}

// =============================================================================
// Tests
// =============================================================================
