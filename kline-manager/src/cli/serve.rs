//! Serve command - run the ingestion service

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::Settings;
use crate::provider::binance::BinanceFuturesClient;
use crate::provider::KlineSource;
use crate::scheduler::{Cadence, IngestionPipeline, IngestionScheduler, PipelineConfig};
use crate::storage::{CandleStore, InMemoryCandleStore, KlineRepository, SchemaManager};
use crate::symbol::KnownSymbols;

/// Arguments for the serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Write to Postgres; `--persist=false` keeps candles in memory (dry run)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub persist: bool,

    /// Skip the startup backfill
    #[arg(long)]
    pub skip_backfill: bool,
}

/// Execute the serve command
pub async fn execute(args: ServeArgs) -> Result<()> {
    let settings = super::load_settings()?;

    info!("Starting kline manager");
    info!(
        "Exchange: {} (quote suffix {}, {} req/s, concurrency {})",
        settings.exchange.base_url,
        settings.exchange.quote_suffix,
        settings.exchange.requests_per_second,
        settings.exchange.fetch_concurrency
    );

    let source: Arc<dyn KlineSource> = Arc::new(
        BinanceFuturesClient::with_settings(settings.exchange.to_provider_settings())
            .context("failed to build exchange client")?,
    );
    let store = open_store(&settings, args.persist).await?;

    let cadences = settings
        .ingestion
        .cadences
        .iter()
        .map(Cadence::from_settings)
        .collect::<Result<Vec<_>, _>>()?;

    let pipeline = Arc::new(IngestionPipeline::new(
        source,
        store,
        KnownSymbols::default(),
        PipelineConfig::from_settings(&settings),
    ));

    if args.skip_backfill {
        warn!("Skipping startup backfill");
    } else {
        pipeline.startup().await?;
    }

    let scheduler = IngestionScheduler::new(pipeline, cadences);
    spawn_signal_listener(scheduler.shutdown_handle());

    scheduler.run().await?;

    info!("Kline manager stopped");
    Ok(())
}

async fn open_store(settings: &Settings, persist: bool) -> Result<Arc<dyn CandleStore>> {
    if !persist {
        warn!("Persistence disabled, candles are kept in memory only");
        return Ok(Arc::new(InMemoryCandleStore::new()));
    }

    let repository = KlineRepository::from_settings(&settings.database)
        .await
        .context("failed to connect to database")?;
    SchemaManager::new(repository.pool().clone())
        .run_migrations()
        .await?;
    Ok(Arc::new(repository))
}

/// Forward Ctrl+C (and SIGTERM on unix) to the scheduler
fn spawn_signal_listener(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, waiting for in-flight runs");
        let _ = shutdown_tx.send(());
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
