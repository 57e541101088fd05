// kline-common: shared plumbing for the kline ingestion services
// Used by kline-manager (service + CLI)

pub mod error;
pub mod logging;
