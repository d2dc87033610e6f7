//! Credential storage at rest
//!
//! An SSH private key is sealed with a user passphrase and kept in a single
//! storage slot. The plaintext never reaches the store.
//!
//! # Architecture
//!
//! - `crypto`: envelope cipher (PBKDF2-HMAC-SHA256 + ChaCha20-Poly1305)
//! - `store`: key-value persistence boundary (memory or file backed)
//! - `service`: the vault itself, one sealed record per context
//! - `secret`: zeroize-on-drop holders for keys and passphrases

pub mod crypto;
pub mod secret;
pub mod service;
pub mod store;

pub use crypto::{open, open_async, seal, seal_async, NONCE_LEN, SALT_LEN};
pub use secret::{Passphrase, SecretKey};
pub use service::{CredentialRecord, CredentialVault, RECORD_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore};
