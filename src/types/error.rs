//! Error types for Wicket
//!
//! Messages never carry passphrases, plaintext keys or derived key bytes.

/// Main error type for Wicket operations
#[derive(Debug, thiserror::Error)]
pub enum WicketError {
    #[error("No stored SSH key is configured")]
    MissingCredential,

    #[error("A passphrase is required to unlock the stored SSH key")]
    PassphraseRequired,

    /// Wrong passphrase and corrupted envelope are reported identically.
    #[error("Failed to decrypt the stored SSH key")]
    DecryptionFailed,

    #[error("Failed to open transport: {0}")]
    TransportOpenFailed(String),

    #[error("Transport closed unexpectedly: {0}")]
    TransportClosedUnexpectedly(String),

    #[error("Storage error: {0}")]
    StorageFault(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Remote error ({code}): {message}")]
    Remote { code: String, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WicketError {
    /// Whether repeating the same call could succeed without new user input.
    ///
    /// Credential and cipher failures always need new input (a passphrase,
    /// a saved key), so they are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportOpenFailed(_) | Self::TransportClosedUnexpectedly(_) | Self::Http(_)
        )
    }

    /// Stable machine-readable code, used by the CLI exit path and logs.
    pub fn code(&self) -> &str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::PassphraseRequired => "passphrase_required",
            Self::DecryptionFailed => "decryption_failed",
            Self::TransportOpenFailed(_) => "transport_open_failed",
            Self::TransportClosedUnexpectedly(_) => "transport_closed_unexpectedly",
            Self::StorageFault(_) => "storage_fault",
            Self::SessionClosed => "session_closed",
            Self::InvalidInput(_) => "invalid_input",
            Self::Remote { code, .. } => code.as_str(),
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for WicketError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageFault(err.to_string())
    }
}

impl From<serde_json::Error> for WicketError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WicketError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::TransportClosedUnexpectedly(err.to_string())
    }
}

impl From<reqwest::Error> for WicketError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL so query strings never reach logs.
        Self::Http(err.without_url().to_string())
    }
}

/// Result type alias for Wicket operations
pub type Result<T> = std::result::Result<T, WicketError>;
