//! SSH authentication method configured for the remote host.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::WicketError;

/// How the gateway authenticates to the remote host.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Server-side password; the client sends no key material.
    #[default]
    Password,
    /// Client-held private key, unlocked from the vault.
    Key,
}

impl AuthMethod {
    /// Whether this method needs plaintext key material from the client.
    pub fn requires_key(&self) -> bool {
        matches!(self, Self::Key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Key => "key",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMethod {
    type Err = WicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "password" => Ok(Self::Password),
            "key" => Ok(Self::Key),
            other => Err(WicketError::InvalidInput(format!(
                "Unknown auth method: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("key".parse::<AuthMethod>().unwrap(), AuthMethod::Key);
        assert_eq!(" Password ".parse::<AuthMethod>().unwrap(), AuthMethod::Password);
        assert!("agent".parse::<AuthMethod>().is_err());
    }

    #[test]
    fn test_requires_key() {
        assert!(AuthMethod::Key.requires_key());
        assert!(!AuthMethod::Password.requires_key());
        assert_eq!(AuthMethod::default(), AuthMethod::Password);
    }
}
