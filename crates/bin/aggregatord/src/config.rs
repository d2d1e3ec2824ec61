//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `aggregator.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use aggregator_adapter_http_sensor::HttpSensorConfig;
use aggregator_adapter_sinks::SinksConfig;
use aggregator_adapter_storage_sqlite_sqlx::Config as DatabaseConfig;
use aggregator_app::action_engine::ActionEngineConfig;
use aggregator_app::collector::CollectorConfig;
use aggregator_app::scheduler::SchedulerConfig;
use aggregator_domain::endpoint::Endpoint;
use aggregator_domain::error::AggregatorError;
use aggregator_domain::rule::{ActionDescriptor, Predicate, Rule};
use aggregator_domain::time::seconds;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Collection loop settings.
    pub collector: CollectorSection,
    /// Action loop settings.
    pub actions: ActionsSection,
    /// How sensor endpoints are queried.
    pub sensor: HttpSensorConfig,
    /// Action sink settings.
    pub sinks: SinksConfig,
    /// Endpoints registered at startup.
    pub endpoints: Vec<EndpointSeed>,
    /// Rules created or updated at startup.
    pub rules: Vec<RuleSeed>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// `[collector]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CollectorSection {
    #[serde(rename = "interval_secs", with = "seconds")]
    pub interval: Duration,
    pub max_in_flight: usize,
    /// Points kept in memory while the database is unavailable.
    pub max_pending_points: usize,
    /// Used for seeded endpoints without their own timeout.
    #[serde(rename = "default_timeout_secs", with = "seconds")]
    pub default_timeout: Duration,
    #[serde(rename = "shutdown_grace_secs", with = "seconds")]
    pub shutdown_grace: Duration,
    #[serde(rename = "max_backoff_secs", with = "seconds")]
    pub max_backoff: Duration,
    /// Fetch each endpoint's history since its newest stored point before
    /// the first cycle.
    pub backfill_on_start: bool,
}

/// `[actions]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActionsSection {
    #[serde(rename = "interval_secs", with = "seconds")]
    pub interval: Duration,
    pub max_concurrent_rules: usize,
    pub evaluate_after_collection: bool,
}

/// One `[[endpoints]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSeed {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub colour: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// One `[[rules]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSeed {
    pub name: String,
    pub predicate: Predicate,
    pub action: ActionDescriptor,
    #[serde(default)]
    pub cooldown_secs: Option<f64>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl EndpointSeed {
    /// Build the endpoint this entry describes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Seed`] when the entry is not a valid endpoint.
    pub fn to_endpoint(&self, default_timeout: Duration) -> Result<Endpoint, ConfigError> {
        let label = self.name.clone().unwrap_or_else(|| self.url.clone());
        let timeout = match self.timeout_secs {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map_err(|err| ConfigError::Validation(format!("endpoint {label}: {err}")))?,
            None => default_timeout,
        };
        let mut builder = Endpoint::builder().url(&self.url).timeout(timeout);
        if let Some(name) = &self.name {
            builder = builder.name(name);
        }
        if let Some(api_key) = &self.api_key {
            builder = builder.api_key(api_key);
        }
        if let Some(colour) = &self.colour {
            builder = builder.colour(colour);
        }
        if let Some(enabled) = self.enabled {
            builder = builder.enabled(enabled);
        }
        builder.build().map_err(|source| ConfigError::Seed { label, source })
    }
}

impl RuleSeed {
    /// Build the rule this entry describes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Seed`] when the entry is not a valid rule.
    pub fn to_rule(&self) -> Result<Rule, ConfigError> {
        let mut builder = Rule::builder()
            .name(&self.name)
            .predicate(self.predicate.clone())
            .action(self.action.clone());
        if let Some(secs) = self.cooldown_secs {
            let cooldown = Duration::try_from_secs_f64(secs)
                .map_err(|err| ConfigError::Validation(format!("rule {}: {err}", self.name)))?;
            builder = builder.cooldown(cooldown);
        }
        if let Some(enabled) = self.enabled {
            builder = builder.enabled(enabled);
        }
        builder.build().map_err(|source| ConfigError::Seed {
            label: self.name.clone(),
            source,
        })
    }
}

impl Config {
    /// Load configuration from `aggregator.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("aggregator.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AGGREGATOR_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("AGGREGATOR_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("AGGREGATOR_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("AGGREGATOR_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("AGGREGATOR_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.collector.interval.is_zero() || self.actions.interval.is_zero() {
            return Err(ConfigError::Validation(
                "loop intervals must be non-zero".to_string(),
            ));
        }
        if self.collector.max_in_flight == 0 || self.actions.max_concurrent_rules == 0 {
            return Err(ConfigError::Validation(
                "concurrency limits must be non-zero".to_string(),
            ));
        }
        for seed in &self.endpoints {
            seed.to_endpoint(self.collector.default_timeout)?;
        }
        for seed in &self.rules {
            seed.to_rule()?;
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    #[must_use]
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            max_in_flight: self.collector.max_in_flight,
            max_pending_points: self.collector.max_pending_points,
        }
    }

    #[must_use]
    pub fn action_engine_config(&self) -> ActionEngineConfig {
        ActionEngineConfig {
            max_concurrent_rules: self.actions.max_concurrent_rules,
        }
    }

    #[must_use]
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            collection_interval: self.collector.interval,
            action_interval: self.actions.interval,
            max_backoff: self.collector.max_backoff,
            shutdown_grace: self.collector.shutdown_grace,
            evaluate_after_collection: self.actions.evaluate_after_collection,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "aggregatord=info,aggregator=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for CollectorSection {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        let collector = CollectorConfig::default();
        Self {
            interval: scheduler.collection_interval,
            max_in_flight: collector.max_in_flight,
            max_pending_points: collector.max_pending_points,
            default_timeout: aggregator_domain::endpoint::DEFAULT_TIMEOUT,
            shutdown_grace: scheduler.shutdown_grace,
            max_backoff: scheduler.max_backoff,
            backfill_on_start: false,
        }
    }
}

impl Default for ActionsSection {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            interval: scheduler.action_interval,
            max_concurrent_rules: ActionEngineConfig::default().max_concurrent_rules,
            evaluate_after_collection: scheduler.evaluate_after_collection,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// A seeded endpoint or rule is invalid.
    #[error("invalid seed {label}")]
    Seed {
        label: String,
        #[source]
        source: AggregatorError,
    },
}
