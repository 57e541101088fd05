//! Kline Manager CLI
//!
//! Provides commands for:
//! - `serve`: Run startup backfill and the refresh cadences
//! - `fetch`: Fetch candles for one symbol
//! - `symbols`: List the tracked symbol universe
//! - `db`: Database operations

use anyhow::Result;
use clap::Parser;

use kline_common::logging::{init_logging, LogConfig};
use kline_manager::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_logging(LogConfig::from_env()).map_err(|e| anyhow::anyhow!(e))?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            kline_manager::cli::serve::execute(args).await?;
        }
        Commands::Fetch(args) => {
            kline_manager::cli::fetch::execute(args).await?;
        }
        Commands::Symbols(args) => {
            kline_manager::cli::symbols::execute(args).await?;
        }
        Commands::Db(cmd) => {
            kline_manager::cli::db::execute(cmd).await?;
        }
    }

    Ok(())
}
