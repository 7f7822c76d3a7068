//! Configuration module for the NestGram runtime.
//!
//! This module provides layered configuration loading (defaults, TOML files,
//! environment variables) and validation of the bot's run settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, Profile, load_config, load_config_from_file};
pub use schema::{
    ApiConfig, LogConfig, LogFormat, LogLevel, NestGramConfig, PollingConfig, RetryConfig,
    RunType, WebhookConfig,
};
pub use validation::validate_config;
