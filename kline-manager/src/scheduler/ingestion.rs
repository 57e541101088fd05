//! Kline ingestion pipeline
//!
//! Startup backfill, per-cadence refresh and retention pruning. Fetch
//! failures are soft: they are logged, counted and the affected symbol
//! yields no data for the run. Store failures abort the run.

use chrono::{DateTime, Duration, Utc};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cron::{CronParseError, Schedule};
use crate::config::{CadenceSettings, Settings};
use crate::provider::KlineSource;
use crate::schema::{MarketType, SymbolCandles, Timeframe};
use crate::storage::{CandleStore, RepositoryError};
use crate::symbol::{diff_symbols, KnownSymbols};
use kline_common::error::{ErrorCategory, ErrorClassification};

/// Fatal ingestion errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cadence task failed: {0}")]
    Task(String),
}

impl ErrorClassification for IngestError {
    fn category(&self) -> ErrorCategory {
        match self {
            IngestError::Persistence(_) => ErrorCategory::Fatal,
            IngestError::Configuration(_) => ErrorCategory::Configuration,
            IngestError::Task(_) => ErrorCategory::Fatal,
        }
    }
}

impl From<CronParseError> for IngestError {
    fn from(e: CronParseError) -> Self {
        IngestError::Configuration(e.to_string())
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

/// Maximum age of stored candles for one timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub timeframe: Timeframe,
    pub max_age_hours: u32,
}

impl RetentionPolicy {
    pub fn new(timeframe: Timeframe, max_age_hours: u32) -> Self {
        Self {
            timeframe,
            max_age_hours,
        }
    }

    /// Candles that opened before this instant are expired
    ///
    /// Saturates at the earliest representable instant, which prunes nothing.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(Duration::hours(i64::from(self.max_age_hours)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A periodic refresh-and-prune job for one timeframe
#[derive(Debug, Clone)]
pub struct Cadence {
    pub schedule: Schedule,
    pub timeframe: Timeframe,
    pub retention: RetentionPolicy,
    pub refresh_symbols: bool,
}

impl Cadence {
    pub fn new(schedule: Schedule, timeframe: Timeframe, retention_hours: u32) -> Self {
        Self {
            schedule,
            timeframe,
            retention: RetentionPolicy::new(timeframe, retention_hours),
            refresh_symbols: false,
        }
    }

    /// Also refresh the known-symbol universe after each run
    pub fn with_symbol_refresh(mut self) -> Self {
        self.refresh_symbols = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.schedule.name
    }

    pub fn from_settings(settings: &CadenceSettings) -> Result<Self, CronParseError> {
        let schedule = Schedule::cron(&settings.name, &settings.schedule)?;
        let cadence = Self::new(schedule, settings.timeframe, settings.retention_hours);
        Ok(if settings.refresh_symbols {
            cadence.with_symbol_refresh()
        } else {
            cadence
        })
    }
}

/// Pipeline tuning derived from settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub market: MarketType,
    pub backfill_limit: u32,
    pub refresh_limit: u32,
    pub canonical_timeframe: Timeframe,
    /// Every timeframe that receives a startup backfill
    pub timeframes: Vec<Timeframe>,
    pub fetch_concurrency: usize,
    pub backfill_new_listings: bool,
}

impl PipelineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            market: settings.ingestion.market_type,
            backfill_limit: settings.ingestion.backfill_limit,
            refresh_limit: settings.ingestion.refresh_limit,
            canonical_timeframe: settings.ingestion.canonical_timeframe,
            timeframes: settings.ingestion.timeframes(),
            fetch_concurrency: settings.exchange.fetch_concurrency.max(1),
            backfill_new_listings: settings.ingestion.backfill_new_listings,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Outcome of one startup or cadence run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub label: String,
    pub symbols_requested: usize,
    pub symbols_with_data: usize,
    pub candles_written: usize,
    pub warnings: usize,
    pub rows_pruned: u64,
    pub new_symbols: Vec<String>,
}

impl CycleReport {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    fn absorb(&mut self, stats: BatchStats) {
        self.symbols_requested += stats.symbols_requested;
        self.symbols_with_data += stats.symbols_with_data;
        self.candles_written += stats.candles_written;
        self.warnings += stats.warnings;
    }

    fn log(&self, elapsed: std::time::Duration) {
        info!(
            "{} complete in {:.1}s: {} candles for {}/{} symbols, {} warnings, {} rows pruned, {} new symbols",
            self.label,
            elapsed.as_secs_f64(),
            self.candles_written,
            self.symbols_with_data,
            self.symbols_requested,
            self.warnings,
            self.rows_pruned,
            self.new_symbols.len()
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BatchStats {
    symbols_requested: usize,
    symbols_with_data: usize,
    candles_written: usize,
    warnings: usize,
}

/// Fetches candles from a source and writes them to a store
pub struct IngestionPipeline {
    source: Arc<dyn KlineSource>,
    store: Arc<dyn CandleStore>,
    known: KnownSymbols,
    config: PipelineConfig,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn KlineSource>,
        store: Arc<dyn CandleStore>,
        known: KnownSymbols,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            store,
            known,
            config,
        }
    }

    pub fn known_symbols(&self) -> &KnownSymbols {
        &self.known
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the symbol universe and backfill symbols with no stored history
    ///
    /// New symbols are those listed remotely but absent from the store at
    /// the canonical timeframe. Each is backfilled at every configured
    /// timeframe.
    pub async fn startup(&self) -> IngestResult<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport::new("Startup backfill");

        let remote = self.source.fetch_symbols().await;
        remote.log_warnings("Symbol fetch");
        report.warnings += remote.warnings.len();

        let persisted = self
            .store
            .known_symbols(self.config.market, self.config.canonical_timeframe)
            .await?;

        if remote.value.is_empty() && !remote.is_clean() {
            warn!(
                "Symbol list unavailable, continuing with {} stored symbols",
                persisted.len()
            );
            self.known.replace(persisted);
            report.log(started.elapsed());
            return Ok(report);
        }

        let new_symbols = diff_symbols(&remote.value, &persisted);
        info!(
            "{} tradable symbols, {} already stored, {} to backfill",
            remote.value.len(),
            persisted.len(),
            new_symbols.len()
        );
        self.known.replace(remote.value);

        if !new_symbols.is_empty() {
            self.backfill(&new_symbols, &mut report).await?;
        }
        report.new_symbols = new_symbols;

        report.log(started.elapsed());
        Ok(report)
    }

    /// Run one cadence: refresh recent candles, prune, optionally refresh symbols
    pub async fn run_cadence(
        &self,
        cadence: &Cadence,
        now: DateTime<Utc>,
    ) -> IngestResult<CycleReport> {
        let started = Instant::now();
        let mut report = CycleReport::new(format!("Cadence '{}'", cadence.name()));

        let symbols = self.known.snapshot();
        debug!(
            "Cadence '{}' refreshing {} symbols at {}",
            cadence.name(),
            symbols.len(),
            cadence.timeframe
        );

        let stats = self
            .ingest(&symbols, cadence.timeframe, self.config.refresh_limit)
            .await?;
        report.absorb(stats);

        report.rows_pruned = self.prune(&cadence.retention, now).await?;

        if cadence.refresh_symbols {
            let refreshed = self.source.fetch_symbols().await;
            report.warnings += refreshed.warnings.len();
            let added = self.known.apply_refresh(refreshed);

            if !added.is_empty() {
                if self.config.backfill_new_listings {
                    info!("Backfilling {} newly listed symbols", added.len());
                    self.backfill(&added, &mut report).await?;
                } else {
                    info!(
                        "{} newly listed symbols will be refreshed without backfill: {}",
                        added.len(),
                        added.join(", ")
                    );
                }
            }
            report.new_symbols = added;
        }

        report.log(started.elapsed());
        Ok(report)
    }

    /// Delete candles that fall outside `policy`
    pub async fn prune(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> IngestResult<u64> {
        let cutoff = policy.cutoff(now);
        let deleted = self
            .store
            .delete_older_than(policy.timeframe, cutoff)
            .await?;

        info!(
            "Pruned {} {} candles older than {}h (before {})",
            deleted, policy.timeframe, policy.max_age_hours, cutoff
        );
        Ok(deleted)
    }

    /// Fetch `limit` candles per symbol and upsert them in one transaction
    async fn ingest(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        limit: u32,
    ) -> IngestResult<BatchStats> {
        let (batches, mut stats) = self.fetch_batches(symbols, timeframe, limit).await;
        stats.candles_written = self
            .store
            .upsert_batch(self.config.market, timeframe, &batches)
            .await?;
        Ok(stats)
    }

    async fn backfill(&self, symbols: &[String], report: &mut CycleReport) -> IngestResult<()> {
        for &timeframe in &self.config.timeframes {
            info!(
                "Backfilling {} symbols at {} (limit {})",
                symbols.len(),
                timeframe,
                self.config.backfill_limit
            );
            let stats = self
                .ingest(symbols, timeframe, self.config.backfill_limit)
                .await?;
            report.absorb(stats);
        }
        Ok(())
    }

    /// Fetch candles for every symbol with bounded concurrency
    ///
    /// Symbols whose fetch produced nothing are dropped from the batch.
    async fn fetch_batches(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        limit: u32,
    ) -> (Vec<SymbolCandles>, BatchStats) {
        let results: Vec<_> = stream::iter(symbols.iter().cloned())
            .map(|symbol| {
                let source = Arc::clone(&self.source);
                async move {
                    let fetched = source.fetch_candles(&symbol, timeframe, limit).await;
                    (symbol, fetched)
                }
            })
            .buffer_unordered(self.config.fetch_concurrency.max(1))
            .collect()
            .await;

        let mut stats = BatchStats {
            symbols_requested: symbols.len(),
            ..BatchStats::default()
        };
        let mut batches = Vec::with_capacity(results.len());

        for (symbol, fetched) in results {
            fetched.log_warnings(&format!("{} {}", symbol, timeframe));
            stats.warnings += fetched.warnings.len();

            if fetched.value.is_empty() {
                continue;
            }
            stats.symbols_with_data += 1;
            batches.push(SymbolCandles::new(symbol, fetched.value));
        }

        (batches, stats)
    }
}
