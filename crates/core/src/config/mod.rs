//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WAYBOT_*)
//! 2. TOML config file (if WAYBOT_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WAYBOT_*)
/// 2. TOML config file (if WAYBOT_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database.
    ///
    /// Set via WAYBOT_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Session cookie sent with save requests to the archive service.
    ///
    /// Set via WAYBOT_COOKIE environment variable. Without it, availability
    /// lookups still work but new captures are usually refused.
    #[serde(default)]
    pub cookie: Option<String>,

    /// Base URL of the archive API.
    ///
    /// Set via WAYBOT_API_BASE_URL environment variable.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Root that snapshot URLs are built on.
    ///
    /// Set via WAYBOT_ARCHIVE_ROOT environment variable.
    #[serde(default = "default_archive_root")]
    pub archive_root: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via WAYBOT_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-call HTTP timeout in milliseconds.
    ///
    /// Set via WAYBOT_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Deadline for a whole archive request (all URLs, retries and polling).
    ///
    /// Set via WAYBOT_REQUEST_DEADLINE_MS environment variable.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,

    /// Minimum spacing between calls to the archive service.
    ///
    /// Set via WAYBOT_MIN_REQUEST_INTERVAL_MS environment variable.
    #[serde(default = "default_one_second")]
    pub min_request_interval_ms: u64,

    /// Fixed delay between outer retry attempts.
    ///
    /// Set via WAYBOT_RETRY_DELAY_MS environment variable.
    #[serde(default = "default_one_second")]
    pub retry_delay_ms: u64,

    /// First delay between job status polls; doubles on every poll.
    ///
    /// Set via WAYBOT_POLL_BASE_DELAY_MS environment variable.
    #[serde(default = "default_one_second")]
    pub poll_base_delay_ms: u64,

    /// Cap on the delay between job status polls.
    ///
    /// Set via WAYBOT_POLL_MAX_DELAY_MS environment variable.
    #[serde(default = "default_poll_max_delay_ms")]
    pub poll_max_delay_ms: u64,

    /// How many status polls a pending capture job gets.
    ///
    /// Set via WAYBOT_POLL_MAX_ATTEMPTS environment variable.
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    /// Log filter used when RUST_LOG is not set.
    ///
    /// Set via WAYBOT_LOG_LEVEL environment variable.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./waybot.sqlite")
}

fn default_api_base_url() -> String {
    "https://wwwb-api.archive.org".into()
}

fn default_archive_root() -> String {
    "https://web.archive.org/web".into()
}

fn default_user_agent() -> String {
    concat!("waybot/", env!("CARGO_PKG_VERSION")).into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_request_deadline_ms() -> u64 {
    600_000
}

fn default_one_second() -> u64 {
    1_000
}

fn default_poll_max_delay_ms() -> u64 {
    30_000
}

fn default_poll_max_attempts() -> u32 {
    40
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            cookie: None,
            api_base_url: default_api_base_url(),
            archive_root: default_archive_root(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            request_deadline_ms: default_request_deadline_ms(),
            min_request_interval_ms: default_one_second(),
            retry_delay_ms: default_one_second(),
            poll_base_delay_ms: default_one_second(),
            poll_max_delay_ms: default_poll_max_delay_ms(),
            poll_max_attempts: default_poll_max_attempts(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn poll_base_delay(&self) -> Duration {
        Duration::from_millis(self.poll_base_delay_ms)
    }

    pub fn poll_max_delay(&self) -> Duration {
        Duration::from_millis(self.poll_max_delay_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WAYBOT_`
    /// 2. TOML file from `WAYBOT_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WAYBOT_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WAYBOT_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The archive session cookie, for callers that cannot proceed without one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no cookie is configured.
    pub fn require_cookie(&self) -> Result<&str, ConfigError> {
        self.cookie
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "cookie".into(),
                hint: "Set WAYBOT_COOKIE to an archive.org session cookie".into(),
            })
    }
}
