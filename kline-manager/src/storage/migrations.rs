//! Klines table schema management

use sqlx::PgPool;
use tracing::info;

use super::RepositoryResult;

/// Creates the klines table and its indexes
pub struct SchemaManager {
    pool: PgPool,
}

impl SchemaManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations; safe to repeat
    pub async fn run_migrations(&self) -> RepositoryResult<()> {
        info!("Running klines migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS klines (
                datetime TIMESTAMPTZ NOT NULL,
                symbol VARCHAR(30) NOT NULL,
                "type" VARCHAR(1) NOT NULL,
                "interval" VARCHAR(3) NOT NULL,
                open NUMERIC(32, 8) NOT NULL,
                high NUMERIC(32, 8) NOT NULL,
                low NUMERIC(32, 8) NOT NULL,
                close NUMERIC(32, 8) NOT NULL,
                volume NUMERIC(32, 8),
                close_time TIMESTAMPTZ,
                quote_asset_volume NUMERIC(32, 8),
                nr_of_trades BIGINT,
                taker_buy_base_asset_volume NUMERIC(32, 8),
                taker_buy_quote_asset_volume NUMERIC(32, 8),
                "ignore" INT NOT NULL DEFAULT 0,
                PRIMARY KEY (datetime, symbol, "type", "interval")
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Serves retention deletes and the per-timeframe symbol lookup
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_klines_interval_datetime
            ON klines ("interval", datetime)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Klines migrations complete");
        Ok(())
    }
}
