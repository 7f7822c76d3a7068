//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{NestGramConfig, RetryConfig, RunType};

/// Validates the entire configuration.
pub fn validate_config(config: &NestGramConfig) -> ConfigResult<()> {
    if config.token.trim().is_empty() {
        return Err(ConfigError::missing_field("token"));
    }

    if config.file_logging && config.file_logging_limit == 0 {
        return Err(ConfigError::validation(
            "file_logging_limit must be greater than 0",
        ));
    }

    validate_polling_config(config)?;
    validate_retry_config(&config.polling.retry)?;

    if config.run_type == RunType::Webhook {
        validate_port(config.port)?;
        match &config.webhook.url {
            Some(url) => validate_url(url)?,
            None => return Err(ConfigError::missing_field("webhook.url")),
        }
    }

    Ok(())
}

/// Validates polling and API timeouts.
fn validate_polling_config(config: &NestGramConfig) -> ConfigResult<()> {
    if !(1..=100).contains(&config.polling.limit) {
        return Err(ConfigError::validation(format!(
            "polling.limit must be between 1 and 100, got {}",
            config.polling.limit
        )));
    }

    if config.api.timeout_secs <= config.polling.timeout_secs {
        return Err(ConfigError::validation(format!(
            "api.timeout_secs ({}) must be greater than polling.timeout_secs ({})",
            config.api.timeout_secs, config.polling.timeout_secs
        )));
    }

    Ok(())
}

/// Validates retry configuration.
fn validate_retry_config(retry: &RetryConfig) -> ConfigResult<()> {
    if retry.initial_delay_ms == 0 {
        return Err(ConfigError::validation(
            "Initial retry delay must be greater than 0",
        ));
    }

    if retry.max_delay_ms < retry.initial_delay_ms {
        return Err(ConfigError::validation(
            "Max retry delay must be greater than or equal to initial delay",
        ));
    }

    if retry.backoff_multiplier < 1.0 {
        return Err(ConfigError::validation(
            "Backoff multiplier must be at least 1.0",
        ));
    }

    Ok(())
}

/// Validates the public webhook URL.
fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("webhook.url"));
    }

    let valid_schemes = ["http://", "https://"];
    if !valid_schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {:?}", valid_schemes),
        ));
    }

    Ok(())
}

/// Validates a port number.
fn validate_port(port: u16) -> ConfigResult<()> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NestGramConfig {
        NestGramConfig {
            token: "123:abc".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_default_with_token() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_validate_missing_token() {
        let config = NestGramConfig::default();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { field }) if field == "token"
        ));
    }

    #[test]
    fn test_validate_webhook_requires_url() {
        let mut config = valid();
        config.run_type = RunType::Webhook;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.webhook.url = Some("ftp://example.com".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        config.webhook.url = Some("https://example.com/hook".into());
        assert!(validate_config(&config).is_ok());

        config.port = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPort(0))
        ));
    }

    #[test]
    fn test_validate_api_timeout_exceeds_poll_timeout() {
        let mut config = valid();
        config.api.timeout_secs = config.polling.timeout_secs;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_retry_and_log_limits() {
        let mut config = valid();
        config.polling.retry.backoff_multiplier = 0.5;
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.file_logging_limit = 0;
        assert!(validate_config(&config).is_err());
    }
}
