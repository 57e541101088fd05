//! Ingestion scheduling
//!
//! Provides cron expressions, the ingestion pipeline that fetches, upserts
//! and prunes klines, and the scheduler that drives each configured cadence
//! in its own task.

mod cron;
mod ingestion;
mod runner;

pub use cron::*;
pub use ingestion::*;
pub use runner::*;
