//! Postgres repository tests
//!
//! Require a reachable database in `DATABASE_URL`; run with
//! `cargo test -- --ignored`. Rows are written in 2001 under a test-only
//! symbol and removed afterwards.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use kline_manager::config::DatabaseSettings;
use kline_manager::schema::{Candle, MarketType, SymbolCandles, Timeframe};
use kline_manager::storage::{CandleStore, KlineRepository, SchemaManager};

const TEST_TIMEFRAME: Timeframe = Timeframe::ThreeDays;

async fn repository() -> KlineRepository {
    let settings = DatabaseSettings {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
        ..DatabaseSettings::default()
    };
    let repository = KlineRepository::from_settings(&settings).await.unwrap();
    SchemaManager::new(repository.pool().clone())
        .run_migrations()
        .await
        .unwrap();
    repository
}

fn candle(open_time: DateTime<Utc>, close: Decimal) -> Candle {
    Candle {
        open_time,
        open: dec!(1.5),
        high: dec!(2.25),
        low: dec!(1.125),
        close,
        volume: dec!(1000.12345678),
        close_time: open_time + TEST_TIMEFRAME.duration() - Duration::milliseconds(1),
        quote_volume: dec!(1500),
        trade_count: 321,
        taker_buy_base_volume: dec!(500),
        taker_buy_quote_volume: dec!(750),
    }
}

async fn cleanup(repository: &KlineRepository, symbol: &str) {
    sqlx::query("DELETE FROM klines WHERE symbol = $1")
        .bind(symbol)
        .execute(repository.pool())
        .await
        .unwrap();
}

async fn stored_close(repository: &KlineRepository, symbol: &str, at: DateTime<Utc>) -> Vec<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        r#"SELECT close FROM klines WHERE symbol = $1 AND "interval" = $2 AND datetime = $3"#,
    )
    .bind(symbol)
    .bind(TEST_TIMEFRAME.as_str())
    .bind(at)
    .fetch_all(repository.pool())
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_upsert_is_idempotent_replace() {
    let repository = repository().await;
    let symbol = "TESTUPSERTUSDT";
    cleanup(&repository, symbol).await;

    let t = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
    for close in [dec!(10), dec!(11.5)] {
        repository
            .upsert_batch(
                MarketType::Futures,
                TEST_TIMEFRAME,
                &[SymbolCandles::new(symbol, vec![candle(t, close)])],
            )
            .await
            .unwrap();
    }

    assert_eq!(stored_close(&repository, symbol, t).await, vec![dec!(11.5)]);

    let known = repository
        .known_symbols(MarketType::Futures, TEST_TIMEFRAME)
        .await
        .unwrap();
    assert!(known.contains(&symbol.to_string()));

    cleanup(&repository, symbol).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_prune_respects_timeframe_and_age() {
    let repository = repository().await;
    let symbol = "TESTPRUNEUSDT";
    cleanup(&repository, symbol).await;

    let old = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
    let newer = Utc.with_ymd_and_hms(2001, 3, 1, 0, 0, 0).unwrap();
    let batch = [SymbolCandles::new(
        symbol,
        vec![candle(old, dec!(1)), candle(newer, dec!(2))],
    )];

    repository
        .upsert_batch(MarketType::Futures, TEST_TIMEFRAME, &batch)
        .await
        .unwrap();
    repository
        .upsert_batch(MarketType::Futures, Timeframe::OneWeek, &batch)
        .await
        .unwrap();

    let cutoff = Utc.with_ymd_and_hms(2001, 2, 1, 0, 0, 0).unwrap();
    let deleted = repository
        .delete_older_than(TEST_TIMEFRAME, cutoff)
        .await
        .unwrap();
    assert!(deleted >= 1);

    assert!(stored_close(&repository, symbol, old).await.is_empty());
    assert_eq!(stored_close(&repository, symbol, newer).await, vec![dec!(2)]);

    let weekly: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM klines WHERE symbol = $1 AND "interval" = '1w'"#,
    )
    .bind(symbol)
    .fetch_one(repository.pool())
    .await
    .unwrap();
    assert_eq!(weekly, 2);

    cleanup(&repository, symbol).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_count_tracks_inserts() {
    let repository = repository().await;
    let symbol = "TESTCOUNTUSDT";
    cleanup(&repository, symbol).await;

    let before = repository.count().await.unwrap();
    let t = Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap();
    let candles = (0..5)
        .map(|i| candle(t + TEST_TIMEFRAME.duration() * i, dec!(1)))
        .collect();

    let written = repository
        .upsert_batch(
            MarketType::Futures,
            TEST_TIMEFRAME,
            &[SymbolCandles::new(symbol, candles)],
        )
        .await
        .unwrap();

    assert_eq!(written, 5);
    assert_eq!(repository.count().await.unwrap(), before + 5);

    cleanup(&repository, symbol).await;
}
