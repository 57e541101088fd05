//! Command-line interface
//!
//! Provides CLI commands for the kline manager.

pub mod db;
pub mod fetch;
pub mod serve;
pub mod symbols;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Settings;

/// Kline Manager CLI
#[derive(Parser)]
#[command(name = "kline-manager")]
#[command(about = "Harvests exchange klines into Postgres on a schedule")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run startup backfill, then every cadence until stopped
    Serve(serve::ServeArgs),
    /// Fetch and print candles for one symbol
    Fetch(fetch::FetchArgs),
    /// Print the tracked symbol universe
    Symbols(symbols::SymbolsArgs),
    /// Database operations
    #[command(subcommand)]
    Db(db::DbCommands),
}

/// Load and validate settings
pub fn load_settings() -> Result<Settings> {
    let settings = Settings::load().context("failed to load configuration")?;
    settings
        .validate()
        .context("invalid configuration")?;
    Ok(settings)
}
