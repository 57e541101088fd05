//! # Kline Manager
//!
//! Harvests candlestick (kline) data for every USDT-quoted futures symbol
//! from the Binance REST API and keeps a Postgres `klines` table fresh.
//!
//! ## Features
//!
//! - **Startup backfill**: symbols with no stored history get a full window
//! - **Cadences**: cron-driven refresh of recent candles per timeframe
//! - **Retention**: per-timeframe pruning of expired candles
//! - **Soft failures**: fetch and decode problems degrade to logged warnings
//!
//! ## Architecture
//!
//! A `KlineSource` supplies symbols and candles, a `CandleStore` persists
//! them with idempotent upserts, and the `IngestionScheduler` drives an
//! `IngestionPipeline` on each configured cadence.

pub mod cli;
pub mod config;
pub mod provider;
pub mod scheduler;
pub mod schema;
pub mod storage;
pub mod symbol;

// Re-export commonly used types
pub use config::Settings;
pub use provider::{KlineSource, Partial, ProviderError, ProviderInfo, ProviderResult};
pub use scheduler::{IngestError, IngestionPipeline, IngestionScheduler};
pub use schema::{Candle, MarketType, SymbolCandles, Timeframe};
pub use storage::{CandleStore, KlineRepository, RepositoryError};
pub use symbol::KnownSymbols;
