//! Error types shared across the NestGram crates.
//!
//! Framework-level errors (duplicate scopes, handler panics) live in
//! `nestgram-framework`.

use std::fmt;

use thiserror::Error;

/// A routing identifier that can be resolved from an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identifier {
    Chat,
    User,
    Message,
    CallbackQuery,
    InlineQuery,
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Chat => "chat id",
            Self::User => "user id",
            Self::Message => "message id",
            Self::CallbackQuery => "callback query id",
            Self::InlineQuery => "inline query id",
        })
    }
}

/// Errors returned by remote API operations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The update does not carry an identifier the operation needs.
    #[error("can't find {0} in update")]
    MissingIdentifier(Identifier),

    /// The remote API answered with `ok: false` or a non-2xx status.
    #[error("remote API error ({code}): {description}")]
    Remote {
        /// Error code reported by the API (HTTP status when absent).
        code: i64,
        /// Human-readable description.
        description: String,
    },

    /// The request could not be delivered or the response not read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request or response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A file could not be retrieved or written to disk.
    #[error("download failed: {0}")]
    Download(String),

    /// The API implementation does not support this operation.
    #[error("operation not supported")]
    NotSupported,
}

impl ApiError {
    /// Creates a remote API error.
    pub fn remote(code: i64, description: impl Into<String>) -> Self {
        Self::Remote {
            code,
            description: description.into(),
        }
    }

    /// Creates a download error.
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// An inbound payload could not be decoded as an update.
#[derive(Debug, Error)]
#[error("failed to parse update: {0}")]
pub struct ParseError(#[from] serde_json::Error);

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
