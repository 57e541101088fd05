//! Binance USDT-M futures REST provider
//!
//! Fetches the 24h ticker list to derive the symbol universe and the
//! klines endpoint for candle batches.

mod client;
mod normalizer;
mod types;

pub use client::{BinanceFuturesClient, BinanceSettings};
pub use normalizer::KlineNormalizer;
pub use types::TickerSummary;
