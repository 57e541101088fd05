//! Symbol set reconciliation

use std::collections::HashSet;

/// Symbols present in `remote` but absent from `persisted`
///
/// Comparison is exact string equality. Output follows `remote` order with
/// duplicates removed, though callers must not rely on ordering.
pub fn diff_symbols(remote: &[String], persisted: &[String]) -> Vec<String> {
    let persisted: HashSet<&str> = persisted.iter().map(String::as_str).collect();
    let mut seen = HashSet::with_capacity(remote.len());

    remote
        .iter()
        .filter(|s| !persisted.contains(s.as_str()))
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}
