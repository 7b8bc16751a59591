use gridline_core::RowKey;
use std::collections::{BTreeSet, HashMap};

/// Columns flagged as recently saved, per row.
///
/// Entries only grow while a dataset stays addressed; switching datasets
/// clears everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightRegistry {
    entries: HashMap<RowKey, BTreeSet<String>>,
}

impl HighlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `columns` into the entry for `row_key`
    pub fn merge(&mut self, row_key: RowKey, columns: impl IntoIterator<Item = String>) {
        self.entries.entry(row_key).or_default().extend(columns);
    }

    pub fn get(&self, row_key: &RowKey) -> Option<&BTreeSet<String>> {
        self.entries.get(row_key)
    }

    pub fn is_highlighted(&self, row_key: &RowKey, column: &str) -> bool {
        self.entries
            .get(row_key)
            .is_some_and(|columns| columns.contains(column))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
