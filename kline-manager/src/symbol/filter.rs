//! Quote-suffix symbol filter

use tracing::debug;

/// Longest symbol the `symbol` column can hold
pub const MAX_SYMBOL_LENGTH: usize = 30;

/// Selects symbols quoted in a single asset (e.g. `USDT`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolFilter {
    quote_suffix: String,
}

impl SymbolFilter {
    pub fn new(quote_suffix: impl Into<String>) -> Self {
        Self {
            quote_suffix: quote_suffix.into(),
        }
    }

    pub fn quote_suffix(&self) -> &str {
        &self.quote_suffix
    }

    /// Returns the symbol if it is tracked, `None` otherwise
    ///
    /// Matching is exact (case-sensitive). A symbol equal to the bare suffix
    /// or too long for storage is skipped.
    pub fn accept(&self, symbol: &str) -> Option<String> {
        if !symbol.ends_with(&self.quote_suffix) || symbol.len() == self.quote_suffix.len() {
            return None;
        }
        if symbol.len() > MAX_SYMBOL_LENGTH {
            debug!("Skipping symbol longer than {} chars: {}", MAX_SYMBOL_LENGTH, symbol);
            return None;
        }
        Some(symbol.to_string())
    }

    /// Filter a list, preserving order
    pub fn apply<'a>(&self, symbols: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        symbols.into_iter().filter_map(|s| self.accept(s)).collect()
    }
}

impl Default for SymbolFilter {
    fn default() -> Self {
        Self::new("USDT")
    }
}
