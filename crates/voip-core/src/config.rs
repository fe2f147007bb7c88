//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration is layered: built-in defaults, optional files under `config/`,
//! an explicit file given on the command line, then `VOIPADMIND__*` environment
//! variables.

use crate::error::AppError;
use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tracing::debug;
use validator::Validate;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "VOIPADMIND";

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,

    #[validate(nested)]
    pub database: DatabaseConfig,

    #[serde(default)]
    #[validate(nested)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    #[validate(range(min = 1))]
    pub workers: usize,

    /// Graceful shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_shutdown_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// Database configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[validate(length(min = 1, message = "database.url is required"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Maximum connection lifetime in seconds
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,

    /// Apply pending migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    10
}

fn default_max_lifetime() -> u64 {
    1800 // 30 minutes
}

fn default_run_migrations() -> bool {
    true
}

impl DatabaseConfig {
    /// Create a configuration for the given URL with default pool bounds
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            max_lifetime_secs: default_max_lifetime(),
            run_migrations: default_run_migrations(),
        }
    }
}

/// CDR ingestion configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct IngestConfig {
    /// Upper bound for one ingestion transaction, in seconds
    #[serde(default = "default_ingest_timeout")]
    #[validate(range(min = 1, message = "ingest.timeout_secs must be at least 1"))]
    pub timeout_secs: u64,

    /// IANA zone the switch writes its timestamps in (process local zone if unset)
    #[serde(default)]
    pub timezone: Option<String>,

    /// Maximum accepted CDR payload size in bytes
    #[serde(default = "default_max_payload")]
    #[validate(range(min = 1024))]
    pub max_payload_bytes: usize,
}

fn default_ingest_timeout() -> u64 {
    10
}

fn default_max_payload() -> usize {
    1024 * 1024
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_ingest_timeout(),
            timezone: None,
            max_payload_bytes: default_max_payload(),
        }
    }
}

impl IngestConfig {
    /// Ingestion timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the configured time zone
    ///
    /// Returns `None` when timestamps should be read in the process local zone.
    pub fn time_zone(&self) -> Result<Option<Tz>, AppError> {
        match self.timezone.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => name.parse::<Tz>().map(Some).map_err(|e| {
                AppError::Config(format!("unknown ingest.timezone '{}': {}", name, e))
            }),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default level for the service crates when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON formatted log lines
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config/` files, an optional explicit
    /// file and the environment
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            // Legacy DATABASE_URL acts as the lowest-priority database url
            .set_default("database.url", env::var("DATABASE_URL").unwrap_or_default())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: AppConfig = config.try_deserialize()?;
        cfg.check()?;

        debug!(run_mode = %run_mode, "Configuration loaded");
        Ok(cfg)
    }

    /// Validate field constraints and the configured time zone
    pub fn check(&self) -> Result<(), AppError> {
        self.validate()?;
        self.ingest.time_zone()?;
        Ok(())
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            database: DatabaseConfig::with_url("postgresql://localhost/voip"),
            ingest: IngestConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_default_ingest_config() {
        let config = IngestConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.max_payload_bytes, 1024 * 1024);
        assert!(config.time_zone().unwrap().is_none());
    }

    #[test]
    fn test_time_zone_parsing() {
        let mut config = IngestConfig::default();
        config.timezone = Some("America/Bogota".to_string());
        assert_eq!(config.time_zone().unwrap(), Some(chrono_tz::America::Bogota));

        config.timezone = Some("  ".to_string());
        assert!(config.time_zone().unwrap().is_none());

        config.timezone = Some("Mars/Olympus".to_string());
        assert!(matches!(config.time_zone(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_database_url_fails_validation() {
        let mut config = sample_config();
        assert!(config.check().is_ok());

        config.database.url = String::new();
        assert!(matches!(config.check(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_ingest_timeout_rejected() {
        let mut config = sample_config();
        config.ingest.timeout_secs = 0;
        assert!(config.check().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config = Config::builder()
            .set_override("database.url", "postgresql://db/voip")
            .unwrap()
            .set_override("ingest.timezone", "Europe/Madrid")
            .unwrap()
            .build()
            .unwrap();

        let cfg: AppConfig = config.try_deserialize().unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.database.max_connections, 20);
        assert_eq!(cfg.database.min_connections, 5);
        assert_eq!(cfg.ingest.timezone.as_deref(), Some("Europe/Madrid"));
        assert_eq!(cfg.server_addr(), "0.0.0.0:8080");
    }
}
