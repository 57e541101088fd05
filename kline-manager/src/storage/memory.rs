//! In-memory candle store
//!
//! Same upsert/prune semantics as the Postgres repository without a
//! database. Used for dry runs (`serve --persist=false`) and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};

use super::store::stored_trade_count;
use super::{CandleStore, RepositoryError, RepositoryResult};
use crate::schema::{Candle, MarketType, SymbolCandles, Timeframe};

/// Primary key of a stored candle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandleKey {
    pub open_time: DateTime<Utc>,
    pub symbol: String,
    pub market: MarketType,
    pub timeframe: Timeframe,
}

/// In-memory candle store
#[derive(Default)]
pub struct InMemoryCandleStore {
    rows: RwLock<HashMap<CandleKey, Candle>>,
    failing_symbols: RwLock<HashSet<String>>,
}

impl InMemoryCandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make any batch containing `symbol` fail like a rejected statement
    pub fn fail_on_symbol(&self, symbol: &str) {
        self.failing_symbols.write().insert(symbol.to_string());
    }

    /// Look up a single candle by key
    pub fn get(
        &self,
        symbol: &str,
        market: MarketType,
        timeframe: Timeframe,
        open_time: DateTime<Utc>,
    ) -> Option<Candle> {
        let key = CandleKey {
            open_time,
            symbol: symbol.to_string(),
            market,
            timeframe,
        };
        self.rows.read().get(&key).cloned()
    }

    /// Candles stored for `symbol` at `timeframe`, oldest first
    pub fn candles(&self, symbol: &str, timeframe: Timeframe) -> Vec<Candle> {
        let mut candles: Vec<Candle> = self
            .rows
            .read()
            .iter()
            .filter(|(k, _)| k.symbol == symbol && k.timeframe == timeframe)
            .map(|(_, c)| c.clone())
            .collect();
        candles.sort_by_key(|c| c.open_time);
        candles
    }

    /// Number of candles stored at `timeframe`
    pub fn count_for(&self, timeframe: Timeframe) -> usize {
        self.rows
            .read()
            .keys()
            .filter(|k| k.timeframe == timeframe)
            .count()
    }
}

#[async_trait]
impl CandleStore for InMemoryCandleStore {
    async fn known_symbols(
        &self,
        market: MarketType,
        timeframe: Timeframe,
    ) -> RepositoryResult<Vec<String>> {
        let symbols: BTreeSet<String> = self
            .rows
            .read()
            .keys()
            .filter(|k| k.market == market && k.timeframe == timeframe)
            .map(|k| k.symbol.clone())
            .collect();
        Ok(symbols.into_iter().collect())
    }

    async fn upsert_batch(
        &self,
        market: MarketType,
        timeframe: Timeframe,
        batches: &[SymbolCandles],
    ) -> RepositoryResult<usize> {
        {
            let failing = self.failing_symbols.read();
            if let Some(batch) = batches
                .iter()
                .find(|b| failing.contains(&b.symbol) && !b.candles.is_empty())
            {
                return Err(RepositoryError::Upsert {
                    symbol: batch.symbol.clone(),
                    open_time: batch.candles[0].open_time,
                    source: sqlx::Error::Protocol("statement rejected".to_string()),
                });
            }
        }
        for batch in batches {
            for candle in &batch.candles {
                stored_trade_count(&batch.symbol, candle)?;
            }
        }

        let mut rows = self.rows.write();
        let mut written = 0;
        for batch in batches {
            for candle in &batch.candles {
                let key = CandleKey {
                    open_time: candle.open_time,
                    symbol: batch.symbol.clone(),
                    market,
                    timeframe,
                };
                rows.insert(key, candle.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn delete_older_than(
        &self,
        timeframe: Timeframe,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|k, _| !(k.timeframe == timeframe && k.open_time < cutoff));
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self) -> RepositoryResult<i64> {
        Ok(self.rows.read().len() as i64)
    }
}
