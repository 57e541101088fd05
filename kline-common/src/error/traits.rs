//! Error classification traits.
//!
//! These traits allow errors to self-describe their characteristics so the
//! ingestion loop can tell a degraded fetch apart from a failure that must
//! stop the process.

use std::time::Duration;

use super::common::ConfigurationError;

/// Classification of error types for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient errors that may resolve later (network issues, timeouts)
    Transient,
    /// Permanent errors that won't resolve on retry (malformed payloads)
    Permanent,
    /// Resource exhaustion errors (rate limits, pool exhausted)
    ResourceExhausted,
    /// Configuration errors (missing config, invalid settings)
    Configuration,
    /// Unrecoverable errors; the current process must stop
    Fatal,
}

/// Trait for errors that can classify themselves.
pub trait ErrorClassification {
    /// Returns the category of this error
    fn category(&self) -> ErrorCategory;

    /// Returns true if this error is transient and may succeed later
    fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::ResourceExhausted
        )
    }

    /// Returns true if this error is permanent and won't succeed on retry
    fn is_permanent(&self) -> bool {
        matches!(self.category(), ErrorCategory::Permanent)
    }

    /// Returns true if the process should halt
    fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Fatal | ErrorCategory::Configuration
        )
    }

    /// Suggests a delay before retrying, if applicable
    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self.category() {
            ErrorCategory::Transient => Some(Duration::from_millis(100)),
            ErrorCategory::ResourceExhausted => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}

impl ErrorClassification for ConfigurationError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}
