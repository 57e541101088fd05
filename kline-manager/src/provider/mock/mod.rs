//! Mock kline source for testing
//!
//! Serves a configurable symbol universe and deterministic hourly-aligned
//! candles, records every request, and can inject failures per symbol.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::provider::{KlineSource, Partial, ProviderError, ProviderInfo};
use crate::schema::{Candle, MarketType, Timeframe};

/// A recorded `fetch_candles` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub limit: u32,
}

/// Mock kline source for testing
pub struct MockKlineSource {
    info: ProviderInfo,
    symbols: RwLock<Vec<String>>,
    symbol_failure: Mutex<Option<ProviderError>>,
    failing_symbols: RwLock<HashSet<String>>,
    base_price: RwLock<Decimal>,
    anchor: DateTime<Utc>,
    candle_requests: Mutex<Vec<CandleRequest>>,
    symbol_requests: Mutex<usize>,
}

impl MockKlineSource {
    /// Create a mock serving `symbols`, with candles ending at the current time
    pub fn new(symbols: &[&str]) -> Self {
        Self {
            info: ProviderInfo {
                name: "mock".to_string(),
                display_name: "Mock Kline Source".to_string(),
                market_type: MarketType::Futures,
            },
            symbols: RwLock::new(symbols.iter().map(|s| s.to_string()).collect()),
            symbol_failure: Mutex::new(None),
            failing_symbols: RwLock::new(HashSet::new()),
            base_price: RwLock::new(Decimal::from(100)),
            anchor: Utc::now(),
            candle_requests: Mutex::new(Vec::new()),
            symbol_requests: Mutex::new(0),
        }
    }

    /// Generate candles ending at the bucket containing `anchor`
    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = anchor;
        self
    }

    /// Replace the served symbol universe
    pub fn set_symbols(&self, symbols: &[&str]) {
        *self.symbols.write() = symbols.iter().map(|s| s.to_string()).collect();
    }

    /// Make the next `fetch_symbols` call fail with `error`
    pub fn fail_next_symbol_fetch(&self, error: ProviderError) {
        *self.symbol_failure.lock() = Some(error);
    }

    /// Make every candle fetch for `symbol` fail
    pub fn fail_symbol(&self, symbol: &str) {
        self.failing_symbols.write().insert(symbol.to_string());
    }

    /// Price of the first candle in each generated batch
    pub fn set_base_price(&self, price: Decimal) {
        *self.base_price.write() = price;
    }

    /// All candle requests seen so far
    pub fn candle_requests(&self) -> Vec<CandleRequest> {
        self.candle_requests.lock().clone()
    }

    /// Number of `fetch_symbols` calls seen so far
    pub fn symbol_requests(&self) -> usize {
        *self.symbol_requests.lock()
    }

    fn generate_candles(&self, timeframe: Timeframe, limit: u32) -> Vec<Candle> {
        let step = timeframe.duration();
        let step_ms = step.num_milliseconds();
        let anchor_ms = self.anchor.timestamp_millis();
        let last_open = anchor_ms - anchor_ms.rem_euclid(step_ms);
        let base_price = *self.base_price.read();

        (0..limit)
            .filter_map(|i| {
                let offset = i64::from(limit - 1 - i) * step_ms;
                let open_time = DateTime::from_timestamp_millis(last_open - offset)?;
                let price = base_price + Decimal::from(i);
                Some(Candle {
                    open_time,
                    open: price,
                    high: price + Decimal::ONE,
                    low: price - Decimal::ONE,
                    close: price + Decimal::new(5, 1),
                    volume: Decimal::from(10),
                    close_time: open_time + step - Duration::milliseconds(1),
                    quote_volume: price * Decimal::from(10),
                    trade_count: 100 + u64::from(i),
                    taker_buy_base_volume: Decimal::from(5),
                    taker_buy_quote_volume: price * Decimal::from(5),
                })
            })
            .collect()
    }
}

#[async_trait]
impl KlineSource for MockKlineSource {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn fetch_symbols(&self) -> Partial<Vec<String>> {
        *self.symbol_requests.lock() += 1;

        if let Some(error) = self.symbol_failure.lock().take() {
            return Partial::failed(error);
        }
        Partial::ok(self.symbols.read().clone())
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Partial<Vec<Candle>> {
        self.candle_requests.lock().push(CandleRequest {
            symbol: symbol.to_string(),
            timeframe,
            limit,
        });

        if self.failing_symbols.read().contains(symbol) {
            return Partial::failed(ProviderError::HttpStatus {
                status: 400,
                body: "Invalid symbol. (code -1121)".to_string(),
            });
        }
        Partial::ok(self.generate_candles(timeframe, limit))
    }
}
