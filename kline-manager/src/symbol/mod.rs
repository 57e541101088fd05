//! Symbol universe management
//!
//! This module provides:
//! - SymbolFilter: quote-suffix selection of tradable symbols
//! - diff_symbols: detection of symbols with no stored history
//! - KnownSymbols: the shared universe read by every cadence

mod filter;
mod known;
mod reconcile;

pub use filter::*;
pub use known::*;
pub use reconcile::*;
