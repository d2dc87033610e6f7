//! Transient secret holders.
//!
//! Plaintext key material and passphrases live in zeroize-on-drop buffers
//! and never print through `Debug`.

use std::fmt;

use zeroize::Zeroizing;

/// Plaintext SSH private key (or other secret text) held only for the
/// operation that needs it.
///
/// Deliberately not `Clone`: each resolved key is consumed once.
pub struct SecretKey(Zeroizing<String>);

impl SecretKey {
    /// Wrap plaintext, taking ownership so no other copy stays behind.
    pub fn new(plaintext: String) -> Self {
        Self(Zeroizing::new(plaintext))
    }

    /// Borrow the plaintext for the duration of a send or a seal.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SecretKey {
    fn from(plaintext: String) -> Self {
        Self::new(plaintext)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// User passphrase. Same lifetime rules as [`SecretKey`].
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(passphrase: String) -> Self {
        Self(Zeroizing::new(passphrase))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Empty passphrase with room for interactive entry. Growing past the
    /// capacity reallocates and leaves the old buffer unzeroized.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self::new(String::with_capacity(capacity))
    }

    pub(crate) fn push(&mut self, c: char) {
        self.0.push(c);
    }

    pub(crate) fn pop(&mut self) {
        self.0.pop();
    }
}

impl From<String> for Passphrase {
    fn from(passphrase: String) -> Self {
        Self::new(passphrase)
    }
}

impl From<&str> for Passphrase {
    fn from(passphrase: &str) -> Self {
        Self::new(passphrase.to_string())
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase([REDACTED])")
    }
}
