//! Symbols command - list the tracked symbol universe

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use crate::provider::binance::BinanceFuturesClient;
use crate::provider::KlineSource;
use crate::storage::{CandleStore, KlineRepository};
use crate::symbol::diff_symbols;

/// Arguments for the symbols command
#[derive(Args)]
pub struct SymbolsArgs {
    /// Only print symbols without stored history (needs the database)
    #[arg(long)]
    pub new_only: bool,
}

/// Execute the symbols command
pub async fn execute(args: SymbolsArgs) -> Result<()> {
    let settings = super::load_settings()?;
    let client = BinanceFuturesClient::with_settings(settings.exchange.to_provider_settings())
        .context("failed to build exchange client")?;

    let result = client.fetch_symbols().await;
    for warning in &result.warnings {
        warn!("{}", warning);
    }

    let symbols = if args.new_only {
        let repository = KlineRepository::from_settings(&settings.database).await?;
        let persisted = repository
            .known_symbols(
                settings.ingestion.market_type,
                settings.ingestion.canonical_timeframe,
            )
            .await?;
        diff_symbols(&result.value, &persisted)
    } else {
        result.value
    };

    for symbol in &symbols {
        println!("{}", symbol);
    }
    info!("{} symbols", symbols.len());
    Ok(())
}
