//! Provider trait definitions
//!
//! Fetch operations never fail outright. Transport, status and decode
//! problems are reported as warnings on a `Partial` value so a single bad
//! request cannot abort an ingestion cycle.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::schema::{Candle, MarketType, Timeframe};
use kline_common::error::{ErrorCategory, ErrorClassification};

/// Provider error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid kline for {symbol}: {reason}")]
    InvalidRecord { symbol: String, reason: String },

    #[error("Field parse error for {symbol} at {open_time}: {reason}")]
    FieldParse {
        symbol: String,
        open_time: i64,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ErrorClassification for ProviderError {
    fn category(&self) -> ErrorCategory {
        match self {
            ProviderError::Connection(_) => ErrorCategory::Transient,
            ProviderError::Timeout(_) => ErrorCategory::Transient,
            ProviderError::Request(_) => ErrorCategory::Transient,
            ProviderError::HttpStatus { status, .. } => match status {
                418 | 429 => ErrorCategory::ResourceExhausted,
                s if *s >= 500 => ErrorCategory::Transient,
                _ => ErrorCategory::Permanent,
            },
            ProviderError::Decode(_) => ErrorCategory::Permanent,
            ProviderError::InvalidRecord { .. } => ErrorCategory::Permanent,
            ProviderError::FieldParse { .. } => ErrorCategory::Permanent,
            ProviderError::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A possibly degraded result: whatever could be fetched plus what went wrong
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial<T> {
    pub value: T,
    pub warnings: Vec<ProviderError>,
}

impl<T> Partial<T> {
    /// A clean result without warnings
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn push_warning(&mut self, warning: ProviderError) {
        self.warnings.push(warning);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Emit every warning to the log sink with the given context
    pub fn log_warnings(&self, context: &str) {
        for warning in &self.warnings {
            warn!("{}: {}", context, warning);
        }
    }
}

impl<T: Default> Partial<T> {
    /// An empty result caused by `warning`
    pub fn failed(warning: ProviderError) -> Self {
        Self {
            value: T::default(),
            warnings: vec![warning],
        }
    }
}

/// Information about a kline provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Provider name (e.g., "binance_futures")
    pub name: String,
    /// Provider display name
    pub display_name: String,
    /// Market the provider's candles belong to
    pub market_type: MarketType,
}

/// Source of symbol universes and candle batches
#[async_trait]
pub trait KlineSource: Send + Sync {
    /// Provider information
    fn info(&self) -> &ProviderInfo;

    /// Fetch the tracked symbol universe (already filtered by quote suffix)
    async fn fetch_symbols(&self) -> Partial<Vec<String>>;

    /// Fetch the `limit` most recent candles of `symbol` at `timeframe`
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Partial<Vec<Candle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failed_is_empty() {
        let result: Partial<Vec<String>> =
            Partial::failed(ProviderError::Connection("refused".into()));
        assert!(result.value.is_empty());
        assert!(!result.is_clean());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_partial_warning_keeps_value() {
        let mut result = Partial::ok(vec![1, 2, 3]);
        assert!(result.is_clean());
        result.push_warning(ProviderError::Decode("trailing garbage".into()));
        assert_eq!(result.value, vec![1, 2, 3]);
        assert!(!result.is_clean());
    }

    #[test]
    fn test_status_classification() {
        let throttled = ProviderError::HttpStatus {
            status: 429,
            body: String::new(),
        };
        assert!(throttled.is_transient());

        let bad_symbol = ProviderError::HttpStatus {
            status: 400,
            body: "{\"code\":-1121,\"msg\":\"Invalid symbol.\"}".into(),
        };
        assert!(bad_symbol.is_permanent());
        assert!(!bad_symbol.is_fatal());

        assert!(ProviderError::Timeout("15s".into()).is_transient());
    }
}
