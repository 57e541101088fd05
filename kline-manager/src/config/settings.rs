//! Application settings and configuration

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::provider::binance::BinanceSettings;
use crate::scheduler::CronExpression;
use crate::schema::{MarketType, ParsePrecision, Timeframe};
use kline_common::error::ConfigurationError;

/// Upper bound for a cadence retention horizon (100 years)
pub const MAX_RETENTION_HOURS: u32 = 100 * 365 * 24;

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Exchange REST API configuration
    #[serde(default)]
    pub exchange: ExchangeSettings,
    /// Ingestion cadences and fetch windows
    #[serde(default)]
    pub ingestion: IngestionSettings,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_default()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

/// Exchange REST API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_ticker_path")]
    pub ticker_path: String,
    #[serde(default = "default_klines_path")]
    pub klines_path: String,
    /// Only symbols ending with this suffix are tracked
    #[serde(default = "default_quote_suffix")]
    pub quote_suffix: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Concurrent per-symbol fetches within one run
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default)]
    pub volume_precision: ParsePrecision,
}

fn default_base_url() -> String {
    "https://fapi.binance.com".to_string()
}

fn default_ticker_path() -> String {
    "/fapi/v1/ticker/24hr".to_string()
}

fn default_klines_path() -> String {
    "/fapi/v1/klines".to_string()
}

fn default_quote_suffix() -> String {
    "USDT".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_fetch_concurrency() -> usize {
    3
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ticker_path: default_ticker_path(),
            klines_path: default_klines_path(),
            quote_suffix: default_quote_suffix(),
            request_timeout_secs: default_request_timeout(),
            requests_per_second: default_requests_per_second(),
            fetch_concurrency: default_fetch_concurrency(),
            volume_precision: ParsePrecision::default(),
        }
    }
}

impl ExchangeSettings {
    /// Client settings for the Binance provider
    pub fn to_provider_settings(&self) -> BinanceSettings {
        BinanceSettings {
            base_url: self.base_url.clone(),
            ticker_path: self.ticker_path.clone(),
            klines_path: self.klines_path.clone(),
            quote_suffix: self.quote_suffix.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            requests_per_second: self.requests_per_second,
            volume_precision: self.volume_precision,
        }
    }
}

/// Ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionSettings {
    #[serde(default = "default_market_type")]
    pub market_type: MarketType,
    /// Candles fetched per symbol on first sight
    #[serde(default = "default_backfill_limit")]
    pub backfill_limit: u32,
    /// Candles fetched per symbol on each cadence run
    #[serde(default = "default_refresh_limit")]
    pub refresh_limit: u32,
    /// Timeframe whose stored symbols define "already known"
    #[serde(default = "default_canonical_timeframe")]
    pub canonical_timeframe: Timeframe,
    /// Backfill symbols that appear during a symbol refresh
    #[serde(default)]
    pub backfill_new_listings: bool,
    #[serde(default = "default_cadences")]
    pub cadences: Vec<CadenceSettings>,
}

fn default_market_type() -> MarketType {
    MarketType::Futures
}

fn default_backfill_limit() -> u32 {
    1000
}

fn default_refresh_limit() -> u32 {
    2
}

fn default_canonical_timeframe() -> Timeframe {
    Timeframe::OneHour
}

fn default_cadences() -> Vec<CadenceSettings> {
    vec![
        CadenceSettings {
            name: "hourly".to_string(),
            schedule: "0 * * * *".to_string(),
            timeframe: Timeframe::OneHour,
            retention_hours: 999,
            refresh_symbols: true,
        },
        CadenceSettings {
            name: "four_hourly".to_string(),
            schedule: "0 */4 * * *".to_string(),
            timeframe: Timeframe::FourHours,
            retention_hours: 3999,
            refresh_symbols: false,
        },
    ]
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            market_type: default_market_type(),
            backfill_limit: default_backfill_limit(),
            refresh_limit: default_refresh_limit(),
            canonical_timeframe: default_canonical_timeframe(),
            backfill_new_listings: false,
            cadences: default_cadences(),
        }
    }
}

impl IngestionSettings {
    /// Timeframes covered by the configured cadences, in cadence order
    pub fn timeframes(&self) -> Vec<Timeframe> {
        self.cadences.iter().map(|c| c.timeframe).collect()
    }
}

/// One periodic refresh-and-prune cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceSettings {
    pub name: String,
    /// 5-field cron expression (UTC)
    pub schedule: String,
    pub timeframe: Timeframe,
    /// Candles older than this many hours are pruned after each run
    pub retention_hours: u32,
    /// Whether this cadence refreshes the known-symbol universe
    #[serde(default)]
    pub refresh_symbols: bool,
}

impl Settings {
    /// Load settings from configuration files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_prefix("KLINE_MANAGER")
    }

    /// Load settings with a custom environment variable prefix
    pub fn load_with_prefix(env_prefix: &str) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config_dir = Self::config_dir();

        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            // Local overrides (not checked into git)
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            // e.g. KLINE_MANAGER__DATABASE__URL
            .add_source(
                Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Get the configuration directory path
    fn config_dir() -> String {
        std::env::var("KLINE_MANAGER_CONFIG_DIR").unwrap_or_else(|_| "config".into())
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let exchange = &self.exchange;
        let ingestion = &self.ingestion;

        if exchange.quote_suffix.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "exchange.quote_suffix",
                "must not be empty",
            ));
        }
        if exchange.request_timeout_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "exchange.request_timeout_secs",
                "must be > 0",
            ));
        }
        if exchange.requests_per_second == 0 {
            return Err(ConfigurationError::invalid_value(
                "exchange.requests_per_second",
                "must be > 0",
            ));
        }
        if exchange.fetch_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "exchange.fetch_concurrency",
                "must be > 0",
            ));
        }
        if ingestion.backfill_limit == 0 {
            return Err(ConfigurationError::invalid_value(
                "ingestion.backfill_limit",
                "must be > 0",
            ));
        }
        if ingestion.refresh_limit == 0 {
            return Err(ConfigurationError::invalid_value(
                "ingestion.refresh_limit",
                "must be > 0",
            ));
        }
        if ingestion.cadences.is_empty() {
            return Err(ConfigurationError::MissingField(
                "ingestion.cadences".to_string(),
            ));
        }

        let mut timeframes = HashSet::new();
        for cadence in &ingestion.cadences {
            CronExpression::parse(&cadence.schedule).map_err(|e| {
                ConfigurationError::invalid_value(
                    format!("ingestion.cadences.{}.schedule", cadence.name),
                    e.to_string(),
                )
            })?;

            if cadence.retention_hours == 0 {
                return Err(ConfigurationError::invalid_value(
                    format!("ingestion.cadences.{}.retention_hours", cadence.name),
                    "must be > 0",
                ));
            }
            if cadence.retention_hours > MAX_RETENTION_HOURS {
                return Err(ConfigurationError::invalid_value(
                    format!("ingestion.cadences.{}.retention_hours", cadence.name),
                    format!("must be <= {}", MAX_RETENTION_HOURS),
                ));
            }
            if !timeframes.insert(cadence.timeframe) {
                return Err(ConfigurationError::invalid_value(
                    format!("ingestion.cadences.{}.timeframe", cadence.name),
                    format!("{} is already handled by another cadence", cadence.timeframe),
                ));
            }
        }

        // Startup diffs against this timeframe, so it must receive a backfill
        if !timeframes.contains(&ingestion.canonical_timeframe) {
            return Err(ConfigurationError::Invalid(format!(
                "ingestion.canonical_timeframe {} has no cadence",
                ingestion.canonical_timeframe
            )));
        }

        Ok(())
    }
}
