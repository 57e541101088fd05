//! Database management commands

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use tracing::info;

use crate::scheduler::RetentionPolicy;
use crate::schema::Timeframe;
use crate::storage::{CandleStore, KlineRepository, SchemaManager};

/// Database subcommands
#[derive(Subcommand)]
pub enum DbCommands {
    /// Create the klines table and indexes
    Migrate,
    /// Show the klines row count
    Stats,
    /// Delete candles of one timeframe older than a horizon
    Prune(PruneArgs),
}

/// Arguments for prune command
#[derive(Args)]
pub struct PruneArgs {
    /// Timeframe to prune (e.g., 1h)
    #[arg(long, short)]
    pub timeframe: Timeframe,

    /// Delete candles that opened more than this many hours ago
    #[arg(long)]
    pub hours: u32,
}

/// Execute a database command
pub async fn execute(cmd: DbCommands) -> Result<()> {
    let settings = super::load_settings()?;
    let repository = KlineRepository::from_settings(&settings.database).await?;

    match cmd {
        DbCommands::Migrate => {
            SchemaManager::new(repository.pool().clone())
                .run_migrations()
                .await?;
            info!("Migrations completed");
        }
        DbCommands::Stats => {
            let count = repository.count().await?;
            println!("klines rows: {}", count);
        }
        DbCommands::Prune(args) => {
            let policy = RetentionPolicy::new(args.timeframe, args.hours);
            let deleted = repository
                .delete_older_than(policy.timeframe, policy.cutoff(Utc::now()))
                .await?;
            println!("Deleted {} {} candles older than {}h", deleted, args.timeframe, args.hours);
        }
    }

    Ok(())
}
