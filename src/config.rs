//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::{AccountNumberConfig, EngineConfig, RetryPolicy};
use crate::notify::NotifierConfig;

/// Where accounts and ledger entries are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::InvalidValue("STORE_BACKEND")),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,

    /// Database connection URL (required for the postgres backend)
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    pub log_format: LogFormat,

    /// Attempts per operation when a version check is lost
    pub ledger_max_retries: u32,
    pub ledger_retry_base_delay: Duration,

    pub account_number_prefix: String,
    pub account_number_max_attempts: u32,

    pub notify_queue_capacity: usize,
    pub notify_publish_timeout: Duration,

    /// Reconciliation job period; `None` disables the job
    pub reconcile_interval: Option<Duration>,
}

/// Read `name`, falling back to `default`, and parse it
fn parsed<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_backend: StoreBackend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnv("DATABASE_URL"));
        }

        let database_max_connections = parsed("DATABASE_MAX_CONNECTIONS", "10")?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parsed("PORT", "3000")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") | Err(_) => LogFormat::Pretty,
            Ok(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        let ledger_max_retries: u32 = parsed("LEDGER_MAX_RETRIES", "5")?;
        if ledger_max_retries == 0 {
            return Err(ConfigError::InvalidValue("LEDGER_MAX_RETRIES"));
        }
        let ledger_retry_base_delay =
            Duration::from_millis(parsed("LEDGER_RETRY_BASE_DELAY_MS", "25")?);

        let account_number_prefix =
            env::var("ACCOUNT_NUMBER_PREFIX").unwrap_or_else(|_| "ACC".to_string());
        let account_number_max_attempts: u32 = parsed("ACCOUNT_NUMBER_MAX_ATTEMPTS", "5")?;
        if account_number_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("ACCOUNT_NUMBER_MAX_ATTEMPTS"));
        }

        let notify_queue_capacity: usize = parsed("NOTIFY_QUEUE_CAPACITY", "1024")?;
        if notify_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue("NOTIFY_QUEUE_CAPACITY"));
        }
        let notify_publish_timeout =
            Duration::from_millis(parsed("NOTIFY_PUBLISH_TIMEOUT_MS", "2000")?);

        let reconcile_secs: u64 = parsed("RECONCILE_INTERVAL_SECS", "0")?;
        let reconcile_interval = (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs));

        Ok(Self {
            store_backend,
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            log_format,
            ledger_max_retries,
            ledger_retry_base_delay,
            account_number_prefix,
            account_number_max_attempts,
            notify_queue_capacity,
            notify_publish_timeout,
            reconcile_interval,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            retry: RetryPolicy {
                max_attempts: self.ledger_max_retries,
                base_delay: self.ledger_retry_base_delay,
            },
            account_numbers: AccountNumberConfig {
                prefix: self.account_number_prefix.clone(),
                max_attempts: self.account_number_max_attempts,
            },
        }
    }

    pub fn notifier_config(&self) -> NotifierConfig {
        NotifierConfig {
            capacity: self.notify_queue_capacity,
            publish_timeout: self.notify_publish_timeout,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
