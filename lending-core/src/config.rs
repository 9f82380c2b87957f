//! Configuration for the lending engine

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Lending engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Loan and fine policy
    pub policy: LendingPolicy,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Actor configuration
    pub actor: ActorConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/lending"),
            service_name: "lending-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            policy: LendingPolicy::default(),
            rocksdb: RocksDBConfig::default(),
            actor: ActorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Longest accepted default loan period (one hundred years)
pub const MAX_LOAN_PERIOD_DAYS: u32 = 36_500;

/// Loan period and fine policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LendingPolicy {
    /// Default loan period when the caller gives no due date (days)
    pub loan_period_days: u32,

    /// Fine charged per started day past the due date
    pub fine_rate_per_day: Decimal,

    /// Upper bound on a single loan's fine (no cap when absent)
    pub max_fine: Option<Decimal>,

    /// Borrow limit for patrons registered without an explicit one
    pub default_borrow_limit: u32,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: 30,
            fine_rate_per_day: Decimal::ONE,
            max_fine: None,
            default_borrow_limit: 3,
        }
    }
}

impl LendingPolicy {
    /// Default loan period as a duration
    pub fn loan_period(&self) -> Duration {
        Duration::days(i64::from(self.loan_period_days))
    }

    /// Check policy knobs are usable
    pub fn validate(&self) -> crate::Result<()> {
        if self.loan_period_days == 0 {
            return Err(crate::Error::Config(
                "loan_period_days must be positive".to_string(),
            ));
        }
        if self.loan_period_days > MAX_LOAN_PERIOD_DAYS {
            return Err(crate::Error::Config(format!(
                "loan_period_days must be at most {} (got {})",
                MAX_LOAN_PERIOD_DAYS, self.loan_period_days
            )));
        }
        if self.fine_rate_per_day.is_sign_negative() {
            return Err(crate::Error::Config(format!(
                "fine_rate_per_day must not be negative (got {})",
                self.fine_rate_per_day
            )));
        }
        if let Some(max_fine) = self.max_fine {
            if max_fine.is_sign_negative() {
                return Err(crate::Error::Config(format!(
                    "max_fine must not be negative (got {})",
                    max_fine
                )));
            }
        }
        Ok(())
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Sync the WAL on every loan commit
    pub sync_writes: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 16,
            max_write_buffer_number: 2,
            max_background_jobs: 2,
            sync_writes: true,
        }
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML document
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.policy.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LENDING_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(days) = std::env::var("LENDING_LOAN_DAYS") {
            config.policy.loan_period_days = days
                .parse()
                .map_err(|e| crate::Error::Config(format!("LENDING_LOAN_DAYS: {}", e)))?;
        }

        if let Ok(rate) = std::env::var("LENDING_FINE_RATE") {
            config.policy.fine_rate_per_day = Decimal::from_str(&rate)
                .map_err(|e| crate::Error::Config(format!("LENDING_FINE_RATE: {}", e)))?;
        }

        if let Ok(max_fine) = std::env::var("LENDING_MAX_FINE") {
            config.policy.max_fine = Some(
                Decimal::from_str(&max_fine)
                    .map_err(|e| crate::Error::Config(format!("LENDING_MAX_FINE: {}", e)))?,
            );
        }

        if let Ok(limit) = std::env::var("LENDING_DEFAULT_BORROW_LIMIT") {
            config.policy.default_borrow_limit = limit.parse().map_err(|e| {
                crate::Error::Config(format!("LENDING_DEFAULT_BORROW_LIMIT: {}", e))
            })?;
        }

        config.policy.validate()?;
        Ok(config)
    }
}
