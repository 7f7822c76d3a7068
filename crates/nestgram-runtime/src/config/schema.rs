//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nestgram_core::{GetUpdates, UpdateType, WebhookOptions};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestGramConfig {
    /// Bot token issued by the platform.
    #[serde(default)]
    pub token: String,

    /// How updates are acquired.
    #[serde(default)]
    pub run_type: RunType,

    /// Port of the webhook listener.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Console logging.
    #[serde(default = "default_true")]
    pub logging: bool,

    /// Rotated log files under `<cache_path>/logs`.
    #[serde(default = "default_true")]
    pub file_logging: bool,

    /// Number of rotated log files kept.
    #[serde(default = "default_file_logging_limit")]
    pub file_logging_limit: usize,

    /// Directory for logs and downloads.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for NestGramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            run_type: RunType::default(),
            port: default_port(),
            logging: true,
            file_logging: true,
            file_logging_limit: default_file_logging_limit(),
            cache_path: default_cache_path(),
            polling: PollingConfig::default(),
            webhook: WebhookConfig::default(),
            log: LogConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl NestGramConfig {
    /// Directory holding rotated log files.
    pub fn log_dir(&self) -> PathBuf {
        self.cache_path.join("logs")
    }

    /// Address the webhook listener binds.
    pub fn webhook_addr(&self) -> String {
        format!("{}:{}", self.webhook.host, self.port)
    }
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    80
}

fn default_file_logging_limit() -> usize {
    20
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".nestgram")
}

/// Update acquisition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    /// Long-poll `getUpdates`.
    #[default]
    Polling,
    /// Receive pushed updates over HTTP.
    Webhook,
}

// =============================================================================
// Update sources
// =============================================================================

/// Long-polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Long-poll timeout in seconds.
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,

    /// Maximum updates per batch (1-100).
    #[serde(default = "default_poll_limit")]
    pub limit: u32,

    /// Update kinds to receive; empty means the platform default.
    #[serde(default)]
    pub allowed_updates: Vec<UpdateType>,

    /// Drop updates queued before start.
    #[serde(default)]
    pub drop_pending_updates: bool,

    /// Backoff after failed polls.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout(),
            limit: default_poll_limit(),
            allowed_updates: Vec::new(),
            drop_pending_updates: false,
            retry: RetryConfig::default(),
        }
    }
}

impl PollingConfig {
    /// Parameters of the `getUpdates` call for `offset`.
    pub fn get_updates(&self, offset: Option<i64>) -> GetUpdates {
        GetUpdates {
            offset,
            limit: Some(self.limit),
            timeout: Some(self.timeout_secs),
            allowed_updates: allowed(&self.allowed_updates),
        }
    }
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_poll_limit() -> u32 {
    100
}

fn allowed(types: &[UpdateType]) -> Vec<String> {
    types.iter().map(|t| t.as_str().to_string()).collect()
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay following `current`, capped at the maximum.
    pub fn next_delay(&self, current: Duration) -> Duration {
        current
            .mul_f64(self.backoff_multiplier)
            .min(self.max_delay())
    }
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Public HTTPS URL registered with `setWebhook`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Secret echoed by the platform in every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,

    /// Maximum simultaneous connections the platform opens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,

    /// Update kinds to receive; empty means the platform default.
    #[serde(default)]
    pub allowed_updates: Vec<UpdateType>,

    /// Drop updates queued before start.
    #[serde(default)]
    pub drop_pending_updates: bool,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_host(),
            secret_token: None,
            max_connections: None,
            allowed_updates: Vec::new(),
            drop_pending_updates: false,
        }
    }
}

impl WebhookConfig {
    /// Parameters of the `setWebhook` call, or `None` without a URL.
    pub fn to_options(&self) -> Option<WebhookOptions> {
        let url = self.url.clone()?;
        Some(WebhookOptions {
            url,
            max_connections: self.max_connections,
            allowed_updates: allowed(&self.allowed_updates),
            drop_pending_updates: Some(self.drop_pending_updates),
            secret_token: self.secret_token.clone(),
        })
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

// =============================================================================
// Logging and API
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Log filtering and formatting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    /// Per-target levels, e.g. `nestgram_transport = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

/// Remote API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds. Must exceed `polling.timeout_secs`.
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_api_timeout(),
        }
    }
}

fn default_base_url() -> String {
    nestgram_transport::DEFAULT_BASE_URL.to_string()
}

fn default_api_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NestGramConfig::default();
        assert_eq!(config.port, 80);
        assert_eq!(config.run_type, RunType::Polling);
        assert!(config.logging && config.file_logging);
        assert_eq!(config.file_logging_limit, 20);
        assert_eq!(config.log_dir(), PathBuf::from(".nestgram/logs"));
        assert_eq!(config.webhook_addr(), "0.0.0.0:80");
    }

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 3000,
            backoff_multiplier: 2.0,
        };
        let second = retry.next_delay(retry.initial_delay());
        assert_eq!(second, Duration::from_secs(2));
        assert_eq!(retry.next_delay(second), Duration::from_secs(3));
    }

    #[test]
    fn test_webhook_options_need_url() {
        let mut webhook = WebhookConfig::default();
        assert!(webhook.to_options().is_none());

        webhook.url = Some("https://example.com/hook".into());
        webhook.secret_token = Some("s3cret".into());
        webhook.allowed_updates = vec![UpdateType::Message];
        let options = webhook.to_options().unwrap();
        assert_eq!(options.url, "https://example.com/hook");
        assert_eq!(options.secret_token.as_deref(), Some("s3cret"));
        assert_eq!(options.allowed_updates, ["message"]);
    }

    #[test]
    fn test_get_updates_params() {
        let polling = PollingConfig::default();
        let params = polling.get_updates(Some(7));
        assert_eq!(params.offset, Some(7));
        assert_eq!(params.timeout, Some(30));
        assert!(params.allowed_updates.is_empty());
    }
}
