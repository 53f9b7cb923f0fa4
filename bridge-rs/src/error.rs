//! Error types for bridge-rs

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
///
/// Command compilation has no variant here: it never fails, and genuinely
/// invalid commands are rejected by the remote endpoint as
/// [`BridgeError::RemoteExecutionFailed`].
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No credential has ever been supplied to the session
    #[error("Not authenticated: no credential has been supplied for the management endpoint")]
    Unauthenticated,

    /// Handshake or transport failure, retryable by the caller
    #[error("Connection to management endpoint failed: {cause}")]
    ConnectionFailed { cause: String },

    /// The endpoint reported errors and returned no records
    #[error("Remote execution failed: {}", .messages.join("; "))]
    RemoteExecutionFailed { messages: Vec<String> },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Shorthand for a [`BridgeError::ConnectionFailed`] with a displayable cause
    pub fn connection(cause: impl std::fmt::Display) -> Self {
        Self::ConnectionFailed {
            cause: cause.to_string(),
        }
    }

    /// Whether retrying the same call (after backoff) may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }
}
