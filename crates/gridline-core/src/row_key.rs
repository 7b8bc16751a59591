//! Row identity
//!
//! A row key is a canonical JSON text built from the primary-key columns of a
//! row, e.g. `{"type":"X1"}`. When the dataset declares no primary key the
//! whole row is serialized instead (columns sorted by name). That fallback
//! cannot tell two rows with identical contents apart; such datasets are not
//! editable, so the key is only used for display bookkeeping there.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::{PrimaryKeySpec, RowSnapshot};

/// Stable identity of a row within one dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(value: &str) -> Self {
        RowKey(value.to_string())
    }
}

/// Derive the key of `row` under `primary_keys`.
///
/// Primary-key columns are emitted in declaration order; a column missing
/// from the row contributes `null`.
pub fn compute_row_key(row: &RowSnapshot, primary_keys: &PrimaryKeySpec) -> RowKey {
    if primary_keys.is_empty() {
        let mut entries: Vec<(&String, &Value)> = row.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        return RowKey(canonical_object(entries.into_iter()));
    }

    let entries = primary_keys
        .columns()
        .iter()
        .map(|col| (col, row.get(col).unwrap_or(&Value::Null)));
    RowKey(canonical_object(entries))
}

fn canonical_object<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> String {
    let body: Vec<String> = entries
        .map(|(col, value)| format!("{}:{}", Value::String(col.clone()), value))
        .collect();
    format!("{{{}}}", body.join(","))
}
