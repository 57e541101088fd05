//! Storage layer for klines
//!
//! This module provides the `CandleStore` interface and its Postgres and
//! in-memory implementations, plus schema management for the klines table.

mod memory;
mod migrations;
mod repository;
mod store;

pub use memory::*;
pub use migrations::*;
pub use repository::*;
pub use store::*;
