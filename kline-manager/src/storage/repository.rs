//! Postgres klines repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error, info};

use super::store::stored_trade_count;
use super::{CandleStore, RepositoryError, RepositoryResult};
use crate::config::DatabaseSettings;
use crate::schema::{Candle, MarketType, SymbolCandles, Timeframe};

const UPSERT_KLINE: &str = r#"
    INSERT INTO klines (
        datetime, symbol, "type", "interval",
        open, high, low, close, volume,
        close_time, quote_asset_volume, nr_of_trades,
        taker_buy_base_asset_volume, taker_buy_quote_asset_volume, "ignore"
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, 0)
    ON CONFLICT (datetime, symbol, "type", "interval") DO UPDATE SET
        open = EXCLUDED.open,
        high = EXCLUDED.high,
        low = EXCLUDED.low,
        close = EXCLUDED.close,
        volume = EXCLUDED.volume,
        close_time = EXCLUDED.close_time,
        quote_asset_volume = EXCLUDED.quote_asset_volume,
        nr_of_trades = EXCLUDED.nr_of_trades,
        taker_buy_base_asset_volume = EXCLUDED.taker_buy_base_asset_volume,
        taker_buy_quote_asset_volume = EXCLUDED.taker_buy_quote_asset_volume,
        "ignore" = EXCLUDED."ignore"
"#;

/// Klines repository backed by Postgres
#[derive(Clone)]
pub struct KlineRepository {
    pool: PgPool,
}

impl KlineRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new repository from settings
    pub async fn from_settings(settings: &DatabaseSettings) -> RepositoryResult<Self> {
        if settings.url.is_empty() {
            return Err(RepositoryError::Configuration(
                "database url is empty (set DATABASE_URL)".to_string(),
            ));
        }

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect(&settings.url)
            .await?;

        info!(
            "Connected to database (max_connections={})",
            settings.max_connections
        );
        Ok(Self::new(pool))
    }

    /// Get the database pool reference
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CandleStore for KlineRepository {
    async fn known_symbols(
        &self,
        market: MarketType,
        timeframe: Timeframe,
    ) -> RepositoryResult<Vec<String>> {
        let symbols = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT symbol FROM klines
            WHERE "interval" = $1 AND "type" = $2
            "#,
        )
        .bind(timeframe.as_str())
        .bind(market.code())
        .fetch_all(&self.pool)
        .await?;

        debug!("{} symbols stored at {}", symbols.len(), timeframe);
        Ok(symbols)
    }

    async fn upsert_batch(
        &self,
        market: MarketType,
        timeframe: Timeframe,
        batches: &[SymbolCandles],
    ) -> RepositoryResult<usize> {
        let total: usize = batches.iter().map(|b| b.candles.len()).sum();
        if total == 0 {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        for batch in batches {
            for candle in &batch.candles {
                let trade_count = stored_trade_count(&batch.symbol, candle)?;
                let result = bind_candle(
                    sqlx::query(UPSERT_KLINE),
                    &batch.symbol,
                    market,
                    timeframe,
                    candle,
                    trade_count,
                )
                .execute(&mut *tx)
                .await;

                if let Err(e) = result {
                    error!(
                        "Upsert of {} {} candle failed, rolling back batch of {}: {:?}",
                        batch.symbol, timeframe, total, candle
                    );
                    return Err(RepositoryError::Upsert {
                        symbol: batch.symbol.clone(),
                        open_time: candle.open_time,
                        source: e,
                    });
                }
            }
        }

        tx.commit().await?;

        debug!(
            "Upserted {} {} candles for {} symbols",
            total,
            timeframe,
            batches.len()
        );
        Ok(total)
    }

    async fn delete_older_than(
        &self,
        timeframe: Timeframe,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM klines
            WHERE "interval" = $1 AND datetime < $2
            "#,
        )
        .bind(timeframe.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM klines")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn bind_candle<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    symbol: &'q str,
    market: MarketType,
    timeframe: Timeframe,
    candle: &'q Candle,
    trade_count: i64,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(candle.open_time)
        .bind(symbol)
        .bind(market.code())
        .bind(timeframe.as_str())
        .bind(candle.open)
        .bind(candle.high)
        .bind(candle.low)
        .bind(candle.close)
        .bind(candle.volume)
        .bind(candle.close_time)
        .bind(candle.quote_volume)
        .bind(trade_count)
        .bind(candle.taker_buy_base_volume)
        .bind(candle.taker_buy_quote_volume)
}
