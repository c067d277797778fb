//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("https://") || value.starts_with("http://")
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `request_deadline_ms` is shorter than `timeout_ms`
    /// - `api_base_url` or `archive_root` is not an http(s) URL, or ends in `/`
    /// - `user_agent` is empty
    /// - `poll_max_attempts` is 0 or above 200
    /// - `poll_base_delay_ms` exceeds `poll_max_delay_ms`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }
        if self.request_deadline_ms < self.timeout_ms {
            return Err(invalid("request_deadline_ms", "must not be shorter than timeout_ms"));
        }

        for (field, value) in [("api_base_url", &self.api_base_url), ("archive_root", &self.archive_root)] {
            if !is_http_url(value) {
                return Err(invalid(field, "must be an http(s) URL"));
            }
            if value.ends_with('/') {
                return Err(invalid(field, "must not end with a slash"));
            }
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.poll_max_attempts == 0 {
            return Err(invalid("poll_max_attempts", "must be greater than 0"));
        }
        if self.poll_max_attempts > 200 {
            return Err(invalid("poll_max_attempts", "must not exceed 200"));
        }
        if self.poll_base_delay_ms > self.poll_max_delay_ms {
            return Err(invalid("poll_base_delay_ms", "must not exceed poll_max_delay_ms"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_timeout_too_small() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_timeout_exceeds_limit() {
        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }

    #[test]
    fn test_validate_deadline_shorter_than_timeout() {
        let config = AppConfig { timeout_ms: 10_000, request_deadline_ms: 5_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "request_deadline_ms"));
    }

    #[test]
    fn test_validate_urls() {
        let config = AppConfig { api_base_url: "ftp://archive.org".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "api_base_url"));

        let config = AppConfig { archive_root: "https://web.archive.org/web/".into(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "archive_root"));

        let config = AppConfig { api_base_url: "http://127.0.0.1:8080".into(), ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "user_agent"));
    }

    #[test]
    fn test_validate_poll_settings() {
        let config = AppConfig { poll_max_attempts: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "poll_max_attempts"));

        let config = AppConfig { poll_base_delay_ms: 60_000, poll_max_delay_ms: 30_000, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "poll_base_delay_ms"));
    }

    #[test]
    fn test_validate_edge_case_values() {
        let config = AppConfig { timeout_ms: 100, poll_max_attempts: 1, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
