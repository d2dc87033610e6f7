//! Envelope cipher for credentials at rest.
//!
//! # Algorithms
//!
//! - **Key Derivation**: PBKDF2-HMAC-SHA256, 100,000 iterations, 256-bit key
//! - **Encryption**: ChaCha20-Poly1305 (authenticated encryption)
//!
//! # Envelope Layout
//!
//! ```text
//! base64( salt[16] | nonce[12] | ciphertext | tag[16] )
//! ```
//!
//! The header is position-based, so an envelope needs nothing but the
//! passphrase to open. Every failure while opening collapses into
//! [`WicketError::DecryptionFailed`]; a wrong passphrase and a damaged
//! envelope look the same to the caller.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use super::secret::{Passphrase, SecretKey};
use crate::types::{Result, WicketError};

// =============================================================================
// Constants
// =============================================================================

/// PBKDF2 iteration count
pub const KDF_ITERATIONS: u32 = 100_000;

/// Salt length for key derivation (16 bytes)
pub const SALT_LEN: usize = 16;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Derived key length (32 bytes)
pub const KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

/// Smallest decodable envelope: header plus the tag of an empty plaintext.
pub const MIN_ENVELOPE_LEN: usize = SALT_LEN + NONCE_LEN + AUTH_TAG_LEN;

// =============================================================================
// Primitives
// =============================================================================

/// Generate cryptographically secure random bytes.
///
/// # Type Parameters
///
/// - `N`: The number of bytes to generate
pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Derive a 256-bit key encryption key from a passphrase.
///
/// # Arguments
///
/// - `passphrase`: User's passphrase (UTF-8 bytes)
/// - `salt`: The 16-byte salt from the envelope header
///
/// # Returns
///
/// A 32-byte key encryption key, zeroized when dropped.
///
/// # Security
///
/// - PBKDF2-HMAC-SHA256 with [`KDF_ITERATIONS`] rounds
/// - Salt is fresh per envelope, so equal passphrases derive different keys
/// - Slow by construction; call it from the blocking pool in async code
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase, salt, KDF_ITERATIONS, &mut key[..]);
    key
}

// =============================================================================
// Seal / Open
// =============================================================================

/// Seal `plaintext` under `passphrase` into a base64 envelope.
///
/// # Arguments
///
/// - `plaintext`: The SSH private key text
/// - `passphrase`: User's passphrase
///
/// # Returns
///
/// `base64(salt | nonce | ciphertext | tag)`.
///
/// # Security
///
/// - Salt and nonce are fresh on every call, so sealing the same input
///   twice yields different envelopes
/// - The auth tag covers the whole ciphertext
/// - The derived key is zeroized before returning
pub fn seal(plaintext: &str, passphrase: &str) -> Result<String> {
    let salt: [u8; SALT_LEN] = generate_random_bytes();
    let nonce: [u8; NONCE_LEN] = generate_random_bytes();

    let key = derive_key(passphrase.as_bytes(), &salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| WicketError::Internal(format!("Encryption failed: {e}")))?;

    let mut blob = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(blob))
}

/// Open an envelope produced by [`seal`].
///
/// # Errors
///
/// [`WicketError::DecryptionFailed`] when the envelope is not valid base64,
/// is shorter than [`MIN_ENVELOPE_LEN`], fails tag verification (wrong
/// passphrase or tampering), or decrypts to non-UTF-8 bytes. No partial
/// plaintext is ever returned.
pub fn open(envelope: &str, passphrase: &str) -> Result<SecretKey> {
    let blob = BASE64
        .decode(envelope.trim())
        .map_err(|_| WicketError::DecryptionFailed)?;

    if blob.len() < MIN_ENVELOPE_LEN {
        return Err(WicketError::DecryptionFailed);
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase.as_bytes(), salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| WicketError::DecryptionFailed)?;

    match String::from_utf8(plaintext) {
        Ok(text) => Ok(SecretKey::new(text)),
        Err(err) => {
            err.into_bytes().zeroize();
            Err(WicketError::DecryptionFailed)
        }
    }
}

// =============================================================================
// Blocking-pool wrappers
// =============================================================================

/// [`seal`] on tokio's blocking pool, so the KDF cost never stalls the
/// runtime threads.
pub async fn seal_async(plaintext: SecretKey, passphrase: Passphrase) -> Result<String> {
    tokio::task::spawn_blocking(move || seal(plaintext.expose(), passphrase.expose()))
        .await
        .map_err(|e| WicketError::Internal(format!("Seal task failed: {e}")))?
}

/// [`open`] on tokio's blocking pool.
pub async fn open_async(envelope: String, passphrase: Passphrase) -> Result<SecretKey> {
    tokio::task::spawn_blocking(move || open(&envelope, passphrase.expose()))
        .await
        .map_err(|e| WicketError::Internal(format!("Open task failed: {e}")))?
}

// =============================================================================
// Tests
// =============================================================================
