//! Error types for the NestGram framework.

use thiserror::Error;

use nestgram_core::ApiError;

/// Errors raised while building registries or managing scopes.
#[derive(Debug, Clone, Error)]
pub enum FrameworkError {
    /// Two scope controllers were registered under the same name.
    #[error("scope '{0}' is already registered")]
    DuplicateScope(String),

    /// A handler tried to enter a scope that was never registered.
    #[error("scope '{0}' is not registered")]
    UnknownScope(String),

    /// A middleware or controller method panicked.
    #[error("handler {controller}::{method} panicked: {message}")]
    HandlerPanicked {
        /// Controller name.
        controller: String,
        /// Method key.
        method: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// Resolving an identifier or calling the remote API failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl FrameworkError {
    /// Creates a panic report from a `catch_unwind` payload.
    pub(crate) fn panicked(
        controller: &str,
        method: &str,
        payload: Box<dyn std::any::Any + Send>,
    ) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());

        Self::HandlerPanicked {
            controller: controller.to_string(),
            method: method.to_string(),
            message,
        }
    }
}

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;
