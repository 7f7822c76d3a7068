//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use nestgram_core::ApiError;
use nestgram_framework::FrameworkError;
use nestgram_transport::TransportError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The handler registry could not be built.
    #[error("Failed to build handlers: {0}")]
    Framework(#[from] FrameworkError),

    /// A transport could not be set up.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A remote API call made during start-up failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The runtime is not in a state that allows the operation.
    #[error("Invalid runtime state: {0}")]
    InvalidState(&'static str),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
