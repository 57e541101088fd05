//! Kline data types
//!
//! This module defines the canonical candle schema used throughout the kline
//! manager, together with the decoder for the exchange's positional wire
//! arrays. Everything fetched from a provider is normalized to these types
//! before it is written to the store.

mod decoder;
mod kline;

pub use decoder::*;
pub use kline::*;
