//! Market data provider abstractions and implementations
//!
//! This module defines the `KlineSource` interface the ingestion pipeline
//! pulls from and implements it for the Binance USDT-M futures REST API,
//! plus a mock for tests and development.

pub mod binance;
pub mod mock;
mod traits;

pub use traits::*;
