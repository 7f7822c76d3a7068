//! Error types for the transport layer.

use thiserror::Error;

/// Errors raised while setting up a transport.
///
/// Failures of individual API calls are reported as
/// [`ApiError`](nestgram_core::ApiError) instead.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The listener could not bind its address.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// The address that was requested.
        addr: String,
        /// Reason for failure.
        reason: String,
    },

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
