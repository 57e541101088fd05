//! Fetch command - fetch candles for one symbol without storing them

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use crate::provider::binance::BinanceFuturesClient;
use crate::provider::KlineSource;
use crate::schema::Timeframe;

/// Arguments for the fetch command
#[derive(Args)]
pub struct FetchArgs {
    /// Exchange symbol (e.g., BTCUSDT)
    #[arg(long, short)]
    pub symbol: String,

    /// Candle interval (1m, 5m, 1h, 4h, 1d, ...)
    #[arg(long, short, default_value = "1h")]
    pub timeframe: Timeframe,

    /// Number of most recent candles
    #[arg(long, short, default_value_t = 2)]
    pub limit: u32,

    /// Print candles as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Execute the fetch command
pub async fn execute(args: FetchArgs) -> Result<()> {
    let settings = super::load_settings()?;
    let client = BinanceFuturesClient::with_settings(settings.exchange.to_provider_settings())
        .context("failed to build exchange client")?;

    info!(
        "Fetching {} {} candles for {}",
        args.limit, args.timeframe, args.symbol
    );
    let result = client
        .fetch_candles(&args.symbol, args.timeframe, args.limit)
        .await;

    for warning in &result.warnings {
        warn!("{}", warning);
    }

    for candle in &result.value {
        if args.json {
            println!("{}", serde_json::to_string(candle)?);
        } else {
            println!(
                "{}  O {}  H {}  L {}  C {}  V {}  trades {}",
                candle.open_time,
                candle.open,
                candle.high,
                candle.low,
                candle.close,
                candle.volume,
                candle.trade_count
            );
        }
    }

    info!(
        "{} candles, {} warnings",
        result.value.len(),
        result.warnings.len()
    );
    Ok(())
}
