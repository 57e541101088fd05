//! Error classification shared by the kline services.
//!
//! This module provides:
//! - `ErrorCategory` / `ErrorClassification` so errors can describe how
//!   callers should react (degrade, retry later, halt)
//! - `ConfigurationError` for settings validation
//!
//! # Usage
//!
//! ```rust,ignore
//! use kline_common::error::{ErrorCategory, ErrorClassification};
//!
//! fn handle(err: impl ErrorClassification) {
//!     if err.is_fatal() {
//!         // stop the process, persisted data is the source of truth on restart
//!     }
//! }
//! ```

mod common;
mod traits;

pub use common::*;
pub use traits::*;
