//! Shared known-symbol universe

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::provider::Partial;

/// Thread-safe slot holding the current symbol universe
///
/// Cloning shares the slot. Readers take a snapshot at the start of a run
/// and keep it for the whole run, even if the universe is replaced meanwhile.
#[derive(Debug, Clone, Default)]
pub struct KnownSymbols {
    inner: Arc<RwLock<Arc<Vec<String>>>>,
}

impl KnownSymbols {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(symbols))),
        }
    }

    /// Current universe
    pub fn snapshot(&self) -> Arc<Vec<String>> {
        self.inner.read().clone()
    }

    /// Replace the universe wholesale
    pub fn replace(&self, symbols: Vec<String>) {
        *self.inner.write() = Arc::new(symbols);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Apply a symbol refresh, returning the symbols that were not known before
    ///
    /// A refresh that came back empty with warnings is treated as an outage
    /// and leaves the universe untouched.
    pub fn apply_refresh(&self, refreshed: Partial<Vec<String>>) -> Vec<String> {
        refreshed.log_warnings("Symbol refresh");

        if refreshed.value.is_empty() && !refreshed.is_clean() {
            warn!(
                "Symbol refresh returned nothing, keeping {} known symbols",
                self.len()
            );
            return Vec::new();
        }

        let previous = self.snapshot();
        let added = super::diff_symbols(&refreshed.value, &previous);
        let removed = super::diff_symbols(&previous, &refreshed.value).len();

        info!(
            "Symbol universe refreshed: {} symbols ({} new)",
            refreshed.value.len(),
            added.len()
        );
        if removed > 0 {
            info!("{} symbols no longer listed", removed);
        }

        self.replace(refreshed.value);
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let known = KnownSymbols::new(strings(&["BTCUSDT"]));
        let snapshot = known.snapshot();

        known.replace(strings(&["BTCUSDT", "ETHUSDT"]));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(known.len(), 2);
    }

    #[test]
    fn test_clones_share_slot() {
        let known = KnownSymbols::default();
        let reader = known.clone();
        known.replace(strings(&["SOLUSDT"]));
        assert_eq!(*reader.snapshot(), strings(&["SOLUSDT"]));
    }

    #[test]
    fn test_apply_refresh_reports_new_symbols() {
        let known = KnownSymbols::new(strings(&["BTCUSDT"]));
        let added = known.apply_refresh(Partial::ok(strings(&["BTCUSDT", "ETHUSDT"])));

        assert_eq!(added, strings(&["ETHUSDT"]));
        assert_eq!(*known.snapshot(), strings(&["BTCUSDT", "ETHUSDT"]));
    }

    #[test]
    fn test_apply_refresh_keeps_universe_on_outage() {
        let known = KnownSymbols::new(strings(&["BTCUSDT", "ETHUSDT"]));
        let added = known.apply_refresh(Partial::failed(ProviderError::Connection(
            "connection refused".into(),
        )));

        assert!(added.is_empty());
        assert_eq!(known.len(), 2);
    }

    #[test]
    fn test_apply_refresh_clean_empty_replaces() {
        let known = KnownSymbols::new(strings(&["BTCUSDT"]));
        known.apply_refresh(Partial::ok(Vec::new()));
        assert!(known.is_empty());
    }
}
