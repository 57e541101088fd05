//! Candle store interface and errors

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::schema::{Candle, MarketType, SymbolCandles, Timeframe};
use kline_common::error::{ErrorCategory, ErrorClassification};

/// Repository errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Upsert failed for {symbol} at {open_time}: {source}")]
    Upsert {
        symbol: String,
        open_time: DateTime<Utc>,
        #[source]
        source: sqlx::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl ErrorClassification for RepositoryError {
    /// Persistence failures halt ingestion; there is no in-process retry
    fn category(&self) -> ErrorCategory {
        match self {
            RepositoryError::Database(_) => ErrorCategory::Fatal,
            RepositoryError::Upsert { .. } => ErrorCategory::Fatal,
            RepositoryError::Configuration(_) => ErrorCategory::Configuration,
            RepositoryError::InvalidData(_) => ErrorCategory::Permanent,
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        None
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Trade count as stored in the BIGINT `nr_of_trades` column
pub(crate) fn stored_trade_count(symbol: &str, candle: &Candle) -> RepositoryResult<i64> {
    i64::try_from(candle.trade_count).map_err(|_| {
        RepositoryError::InvalidData(format!(
            "{} candle at {} has trade count {} beyond BIGINT range",
            symbol, candle.open_time, candle.trade_count
        ))
    })
}

/// Persistent candle storage keyed by (open time, symbol, market, timeframe)
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Distinct symbols that have at least one candle at `timeframe`
    async fn known_symbols(
        &self,
        market: MarketType,
        timeframe: Timeframe,
    ) -> RepositoryResult<Vec<String>>;

    /// Upsert every candle of `batches` in one transaction
    ///
    /// Existing rows have all non-key columns replaced. Either every candle
    /// lands or none does. Returns the number of candles written.
    async fn upsert_batch(
        &self,
        market: MarketType,
        timeframe: Timeframe,
        batches: &[SymbolCandles],
    ) -> RepositoryResult<usize>;

    /// Delete candles of `timeframe` that opened before `cutoff`
    async fn delete_older_than(
        &self,
        timeframe: Timeframe,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<u64>;

    /// Total number of stored candles
    async fn count(&self) -> RepositoryResult<i64>;
}
