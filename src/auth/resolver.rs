//! Credential Resolver
//!
//! The one code path that turns "this operation needs an SSH key" into
//! plaintext key material. Terminal sessions and remote session actions
//! both go through it, so passphrase handling and failures stay identical.
//!
//! Resolution order:
//! 1. Password auth needs no key
//! 2. Plaintext already held in memory for this flow wins
//! 3. No stored key -> `MissingCredential`
//! 4. No passphrase -> `PassphraseRequired`
//! 5. Open the stored envelope -> plaintext or `DecryptionFailed`

use tracing::debug;

use super::method::AuthMethod;
use crate::types::{Result, WicketError};
use crate::vault::{CredentialVault, Passphrase, SecretKey};

// =============================================================================
// Request / Outcome
// =============================================================================

/// Inputs for one resolution. Consumed by [`CredentialResolver::resolve`].
#[derive(Debug)]
pub struct CredentialRequest {
    pub method: AuthMethod,
    /// Plaintext supplied earlier in the same flow (e.g. just uploaded, not
    /// yet saved).
    pub in_memory: Option<SecretKey>,
    /// Passphrase entered by the user for this operation.
    pub passphrase: Option<Passphrase>,
}

impl CredentialRequest {
    pub fn new(method: AuthMethod) -> Self {
        Self {
            method,
            in_memory: None,
            passphrase: None,
        }
    }

    pub fn with_in_memory(mut self, key: SecretKey) -> Self {
        self.in_memory = Some(key);
        self
    }

    pub fn with_passphrase(mut self, passphrase: Passphrase) -> Self {
        self.passphrase = Some(passphrase);
        self
    }

    /// True when resolving will have to go to the vault.
    pub fn needs_vault(&self) -> bool {
        self.method.requires_key() && !has_plaintext(&self.in_memory)
    }
}

/// Key material ready for exactly one operation.
#[derive(Debug)]
pub enum ResolvedCredential {
    /// Auth method uses a server-side credential.
    NotRequired,
    /// Plaintext private key.
    Key(SecretKey),
}

impl ResolvedCredential {
    /// Value for the handshake `privateKey` field: the key, or `""`.
    pub fn handshake_value(&self) -> &str {
        match self {
            Self::NotRequired => "",
            Self::Key(key) => key.expose(),
        }
    }

    /// The key for request bodies, `None` when no key is needed.
    pub fn private_key(&self) -> Option<&str> {
        match self {
            Self::NotRequired => None,
            Self::Key(key) => Some(key.expose()),
        }
    }
}

/// What the resolver will need, reported before any prompt is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRequirement {
    NotRequired,
    InMemory,
    Passphrase { label: String },
}

// =============================================================================
// Resolver
// =============================================================================

pub struct CredentialResolver {
    vault: CredentialVault,
}

impl CredentialResolver {
    pub fn new(vault: CredentialVault) -> Self {
        Self { vault }
    }

    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// Report what [`resolve`](Self::resolve) will need, so a UI prompts for
    /// a passphrase only when one will actually be used.
    pub fn requirement(
        &self,
        method: AuthMethod,
        has_in_memory: bool,
    ) -> Result<CredentialRequirement> {
        if !method.requires_key() {
            return Ok(CredentialRequirement::NotRequired);
        }
        if has_in_memory {
            return Ok(CredentialRequirement::InMemory);
        }

        match self.vault.stored_label()? {
            Some(label) => Ok(CredentialRequirement::Passphrase { label }),
            None => Err(WicketError::MissingCredential),
        }
    }

    /// Produce the credential for one operation.
    ///
    /// Failures are never retried here; a wrong passphrase needs new input.
    pub async fn resolve(&self, request: CredentialRequest) -> Result<ResolvedCredential> {
        let CredentialRequest {
            method,
            in_memory,
            passphrase,
        } = request;

        if !method.requires_key() {
            return Ok(ResolvedCredential::NotRequired);
        }

        if let Some(key) = in_memory.filter(|key| !key.is_empty()) {
            debug!("Using in-memory SSH key");
            return Ok(ResolvedCredential::Key(key));
        }

        if !self.vault.has_stored_key()? {
            return Err(WicketError::MissingCredential);
        }

        let passphrase = passphrase
            .filter(|p| !p.is_empty())
            .ok_or(WicketError::PassphraseRequired)?;

        let key = self.vault.open_stored(passphrase).await?;
        Ok(ResolvedCredential::Key(key))
    }
}

fn has_plaintext(key: &Option<SecretKey>) -> bool {
    key.as_ref().is_some_and(|k| !k.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
