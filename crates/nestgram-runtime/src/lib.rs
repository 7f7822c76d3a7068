//! NestGram Runtime - running a bot.
//!
//! This crate provides:
//! - Layered configuration (`nestgram.toml`, `NESTGRAM_*` variables)
//! - Logging setup with console output and rotated log files
//! - The long-polling update source
//! - The [`NestGram`] runtime, which starts polling or the webhook listener
//!   and shuts down gracefully
//!
//! ```ignore
//! use nestgram_runtime::NestGram;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = NestGram::builder().module(app_module()).build()?;
//!
//!     // Run until Ctrl+C
//!     bot.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Run Modes
//!
//! - `run_type = "polling"` (default): removes any webhook, then long-polls
//!   `getUpdates` until stopped.
//! - `run_type = "webhook"`: binds `webhook.host:port`, then registers
//!   `webhook.url` with the platform.

pub mod config;
pub mod error;
pub mod logging;
pub mod polling;
pub mod runtime;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, NestGramConfig, PollingConfig, RunType,
    WebhookConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, LoggingError, SpanEvents};
pub use polling::Polling;
pub use runtime::{NestGram, NestGramBuilder};

// Re-export tracing for use in handlers
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
