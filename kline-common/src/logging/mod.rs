//! Standardized logging configuration.
//!
//! Provides a consistent log format across kline services with support for:
//! - Human-readable console output (default)
//! - Compact single-line output for long-running deployments
//! - JSON output for log aggregation
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter (e.g., `info`, `kline_manager=debug`)
//! - `LOG_LEVEL`: Fallback level when `RUST_LOG` is unset
//! - `LOG_FORMAT`: Output format - `pretty` (default), `compact`, or `json`
//! - `LOG_TIMESTAMPS`: Timestamp format - `local` (default), `utc`, or `none`
//!
//! # Usage
//!
//! ```rust,ignore
//! use kline_common::logging::{init_logging, LogConfig};
//!
//! init_logging(LogConfig::from_env())?;
//! ```

mod config;

pub use config::{init_logging, LogConfig, LogFormat, TimestampFormat};
