//! End-to-end ingestion tests
//!
//! Drive the pipeline and scheduler over the mock kline source and the
//! in-memory store: startup backfill, cadence refreshes, pruning and
//! cooperative shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::time::timeout;

use kline_manager::config::Settings;
use kline_manager::provider::mock::MockKlineSource;
use kline_manager::provider::{KlineSource, ProviderError};
use kline_manager::scheduler::{
    Cadence, IngestionPipeline, IngestionScheduler, PipelineConfig, Schedule, ScheduleExpression,
};
use kline_manager::schema::{MarketType, SymbolCandles, Timeframe};
use kline_manager::storage::{CandleStore, InMemoryCandleStore};
use kline_manager::symbol::KnownSymbols;
use rust_decimal_macros::dec;

fn interval_cadence(
    name: &str,
    timeframe: Timeframe,
    every_ms: i64,
    retention_hours: u32,
) -> Cadence {
    let schedule = Schedule::new(
        name,
        ScheduleExpression::Interval(chrono::Duration::milliseconds(every_ms)),
    );
    Cadence::new(schedule, timeframe, retention_hours)
}

fn small_backfill() -> PipelineConfig {
    let mut settings = Settings::default();
    settings.ingestion.backfill_limit = 24;
    PipelineConfig::from_settings(&settings)
}

/// Restarting over an existing store only backfills what is missing
#[tokio::test]
async fn test_restart_resumes_from_store() {
    let anchor = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap();
    let source = Arc::new(MockKlineSource::new(&["BTCUSDT", "ETHUSDT"]).with_anchor(anchor));
    let store = Arc::new(InMemoryCandleStore::new());

    let first = IngestionPipeline::new(
        source.clone(),
        store.clone(),
        KnownSymbols::default(),
        small_backfill(),
    );
    let report = first.startup().await.unwrap();
    assert_eq!(report.new_symbols.len(), 2);
    assert_eq!(report.candles_written, 2 * 2 * 24);

    // A listing appears while the process is down
    source.set_symbols(&["BTCUSDT", "ETHUSDT", "XRPUSDT"]);

    let second = IngestionPipeline::new(
        source.clone(),
        store.clone(),
        KnownSymbols::default(),
        small_backfill(),
    );
    let report = second.startup().await.unwrap();

    assert_eq!(report.new_symbols, vec!["XRPUSDT"]);
    assert_eq!(report.candles_written, 2 * 24);
    assert_eq!(second.known_symbols().len(), 3);
    assert_eq!(store.count().await.unwrap(), 3 * 2 * 24);
}

/// Re-fetching an overlapping window replaces rows instead of duplicating them
#[tokio::test]
async fn test_refresh_overwrites_live_bucket() {
    let anchor = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap();
    let source = Arc::new(MockKlineSource::new(&["BTCUSDT"]).with_anchor(anchor));
    let store = Arc::new(InMemoryCandleStore::new());
    let pipeline = IngestionPipeline::new(
        source.clone(),
        store.clone(),
        KnownSymbols::default(),
        small_backfill(),
    );
    pipeline.startup().await.unwrap();
    let before = store.count().await.unwrap();

    source.set_base_price(dec!(250));
    let cadence = interval_cadence("hourly", Timeframe::OneHour, 1000, 999);
    let report = pipeline.run_cadence(&cadence, anchor).await.unwrap();

    assert_eq!(report.candles_written, 2);
    assert_eq!(store.count().await.unwrap(), before);

    let candles = store.candles("BTCUSDT", Timeframe::OneHour);
    let live = candles.last().unwrap();
    assert_eq!(live.open_time, Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap());
    assert_eq!(live.open, dec!(251));
}

/// Scheduler keeps refreshing until shutdown and prunes per timeframe
#[tokio::test]
async fn test_scheduler_end_to_end() {
    let source = Arc::new(MockKlineSource::new(&["BTCUSDT", "ETHUSDT"]));
    let store = Arc::new(InMemoryCandleStore::new());

    // Expired rows at both timeframes for a symbol that is no longer listed
    let old = MockKlineSource::new(&[]).with_anchor(Utc::now() - chrono::Duration::hours(5000));
    for timeframe in [Timeframe::OneHour, Timeframe::FourHours] {
        let candles = old.fetch_candles("OLDUSDT", timeframe, 3).await.value;
        store
            .upsert_batch(
                MarketType::Futures,
                timeframe,
                &[SymbolCandles::new("OLDUSDT", candles)],
            )
            .await
            .unwrap();
    }

    let pipeline = Arc::new(IngestionPipeline::new(
        source.clone(),
        store.clone(),
        KnownSymbols::default(),
        small_backfill(),
    ));
    let report = pipeline.startup().await.unwrap();
    assert_eq!(report.new_symbols.len(), 2);

    let scheduler = IngestionScheduler::new(
        pipeline.clone(),
        vec![
            interval_cadence("hourly", Timeframe::OneHour, 25, 999).with_symbol_refresh(),
            interval_cadence("four_hourly", Timeframe::FourHours, 40, 6000),
        ],
    );
    let shutdown = scheduler.shutdown_handle();
    let running = tokio::spawn(scheduler.run());

    source.set_symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown.send(()).unwrap();

    let result = timeout(Duration::from_secs(5), running)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert!(result.is_ok());

    // Hourly rows past 999h are gone, 4h rows within 6000h survive
    assert!(store.candles("OLDUSDT", Timeframe::OneHour).is_empty());
    assert_eq!(store.candles("OLDUSDT", Timeframe::FourHours).len(), 3);
    assert_eq!(store.candles("BTCUSDT", Timeframe::OneHour).len(), 24);
    assert_eq!(store.candles("ETHUSDT", Timeframe::FourHours).len(), 24);

    // The new listing is tracked and refreshed, but not backfilled
    assert_eq!(pipeline.known_symbols().len(), 3);
    assert_eq!(store.candles("SOLUSDT", Timeframe::OneHour).len(), 2);
}

/// A symbol outage and a failing symbol never stop the service
#[tokio::test]
async fn test_soft_failures_do_not_stop_cadences() {
    let source = Arc::new(MockKlineSource::new(&["BTCUSDT", "DELISTEDUSDT"]));
    source.fail_symbol("DELISTEDUSDT");
    let store = Arc::new(InMemoryCandleStore::new());
    let pipeline = Arc::new(IngestionPipeline::new(
        source.clone(),
        store.clone(),
        KnownSymbols::default(),
        small_backfill(),
    ));
    pipeline.startup().await.unwrap();

    source.fail_next_symbol_fetch(ProviderError::Timeout("request timed out".into()));

    let scheduler = IngestionScheduler::new(
        pipeline.clone(),
        vec![interval_cadence("hourly", Timeframe::OneHour, 20, 999).with_symbol_refresh()],
    );
    let shutdown = scheduler.shutdown_handle();
    let running = tokio::spawn(scheduler.run());

    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.send(()).unwrap();

    let result = timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(pipeline.known_symbols().len(), 2);
    assert!(store.candles("DELISTEDUSDT", Timeframe::OneHour).is_empty());
    assert_eq!(store.candles("BTCUSDT", Timeframe::OneHour).len(), 24);
}
