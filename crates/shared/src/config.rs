//! Application configuration management.

use std::time::Duration;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Ledger call policy.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Timeouts and retry budgets applied to every store call made by the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Per-call timeout against the database, in seconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,
    /// Retries for idempotent reads.
    #[serde(default = "default_read_retries")]
    pub read_retries: u32,
    /// Base backoff between read retries, in milliseconds. Doubles per attempt.
    #[serde(default = "default_read_backoff")]
    pub read_backoff_ms: u64,
    /// Compare-and-swap attempts for a payment or fee edit before giving up.
    #[serde(default = "default_payment_retries")]
    pub payment_max_retries: u32,
}

fn default_store_timeout() -> u64 {
    10
}

fn default_read_retries() -> u32 {
    2
}

fn default_read_backoff() -> u64 {
    100
}

fn default_payment_retries() -> u32 {
    3
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            store_timeout_secs: default_store_timeout(),
            read_retries: default_read_retries(),
            read_backoff_ms: default_read_backoff(),
            payment_max_retries: default_payment_retries(),
        }
    }
}

impl LedgerConfig {
    /// Returns the per-call timeout.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Returns the base read backoff.
    #[must_use]
    pub const fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("KOSH").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
