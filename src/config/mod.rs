//! # Configuration
//!
//! ## Overview
//!
//! Serde-deserializable settings for the whole crate: database, broker,
//! outbound HTTP retry behavior, and the outbox relay. Loaded from an
//! optional file plus `ROSTER__`-prefixed environment overrides, so
//! `ROSTER__HTTP__MAX_ATTEMPTS=5` wins over the file value.
//!
//! Every knob has a default matching the documented behavior, so a bare
//! `RosterConfig::default()` is a working development configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::orchestration::PublishStrategy;
use crate::resilience::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("configuration could not be loaded: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level settings. Sections may be omitted entirely; defaults fill in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub outbox: OutboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Connection pool size
    #[serde(default = "default_pool")]
    pub pool: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool: default_pool(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker database URL; `None` reuses the main database pool
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_person_topic")]
    pub person_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            person_topic: default_person_topic(),
        }
    }
}

/// Outbound HTTP retry settings. The delay defaults follow the classic
/// 1000ms/5000ms/3 exponential-backoff profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub jitter: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upstream content search endpoint
    #[serde(default)]
    pub upstream_url: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter: false,
            request_timeout_ms: default_request_timeout_ms(),
            upstream_url: None,
            client_id: None,
            client_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: i32,
    #[serde(default)]
    pub strategy: PublishStrategy,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            max_delivery_attempts: default_max_delivery_attempts(),
            strategy: PublishStrategy::default(),
        }
    }
}

fn default_database_url() -> String {
    "postgresql://localhost:5432/roster_development".to_string()
}

fn default_pool() -> u32 {
    10
}

fn default_person_topic() -> String {
    "person_events".to_string()
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_batch_size() -> i64 {
    50
}

fn default_max_delivery_attempts() -> i32 {
    10
}

impl RosterConfig {
    /// Load from the default file location (`config/roster`, any supported
    /// format) plus environment overrides.
    pub fn load() -> Result<Self, ConfigurationError> {
        Self::load_from_file("config/roster")
    }

    /// Load from a specific file (extension optional, file optional) plus
    /// `ROSTER__SECTION__KEY` environment overrides.
    pub fn load_from_file(path: &str) -> Result<Self, ConfigurationError> {
        debug!(path, "Loading configuration");
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("ROSTER").separator("__"))
            .build()?;
        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings that would misbehave at runtime rather than fail at
    /// load time.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.http.max_attempts == 0 {
            return Err(ConfigurationError::Invalid(
                "http.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.http.initial_delay_ms > self.http.max_delay_ms {
            return Err(ConfigurationError::Invalid(format!(
                "http.initial_delay_ms ({}) exceeds http.max_delay_ms ({})",
                self.http.initial_delay_ms, self.http.max_delay_ms
            )));
        }
        if self.outbox.batch_size <= 0 {
            return Err(ConfigurationError::Invalid(
                "outbox.batch_size must be positive".to_string(),
            ));
        }
        if self.outbox.max_delivery_attempts <= 0 {
            return Err(ConfigurationError::Invalid(
                "outbox.max_delivery_attempts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy for the resilient HTTP client.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(self.http.initial_delay_ms),
            max_delay: Duration::from_millis(self.http.max_delay_ms),
            max_attempts: self.http.max_attempts,
            jitter: self.http.jitter,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.http.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.outbox.poll_interval_ms)
    }

    /// Broker connection string, falling back to the main database.
    pub fn broker_url(&self) -> &str {
        self.broker.url.as_deref().unwrap_or(&self.database.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = RosterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.initial_delay_ms, 1000);
        assert_eq!(config.http.max_delay_ms, 5000);
        assert_eq!(config.http.max_attempts, 3);
        assert_eq!(config.broker.person_topic, "person_events");
        assert_eq!(config.outbox.strategy, PublishStrategy::TransactionalOutbox);
    }

    #[test]
    fn retry_policy_mirrors_http_section() {
        let config = RosterConfig::default();
        let policy = config.retry_policy();
        assert_eq!(policy.initial_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_millis(5000));
        assert_eq!(policy.max_attempts, 3);
        assert!(!policy.jitter);
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = RosterConfig::default();
        config.http.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Invalid(_))
        ));
    }

    #[test]
    fn inverted_delay_bounds_rejected() {
        let mut config = RosterConfig::default();
        config.http.initial_delay_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn broker_url_falls_back_to_database() {
        let mut config = RosterConfig::default();
        assert_eq!(config.broker_url(), config.database.url);
        config.broker.url = Some("postgresql://broker:5432/events".to_string());
        assert_eq!(config.broker_url(), "postgresql://broker:5432/events");
    }

    #[test]
    fn partial_file_sections_fill_with_defaults() {
        let partial: RosterConfig = serde_json::from_value(serde_json::json!({
            "http": { "max_attempts": 5 }
        }))
        .unwrap();
        assert_eq!(partial.http.max_attempts, 5);
        assert_eq!(partial.http.initial_delay_ms, 1000);
        assert_eq!(partial.outbox.batch_size, 50);
    }
}
