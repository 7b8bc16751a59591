//! Core types for Gridline

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use serde_json::Value;

/// Page size used when nothing else is configured
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// One row of the current page: column name -> scalar value, in server order.
///
/// Snapshots are never patched in place. The next successful fetch replaces
/// the whole page.
pub type RowSnapshot = IndexMap<String, Value>;

/// Ordered set of columns the backend declares as the row identity.
///
/// Empty means the dataset cannot be addressed for editing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrimaryKeySpec(Vec<String>);

impl PrimaryKeySpec {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut seen = Vec::new();
        for column in columns {
            let column = column.into();
            if !seen.contains(&column) {
                seen.push(column);
            }
        }
        Self(seen)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|c| c == column)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn is_descending(self) -> bool {
        matches!(self, SortDirection::Descending)
    }

    pub fn label(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// Remote list endpoint the grid reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A named master table: `/api/tables/{name}`
    Table(String),
    /// Any other list endpoint with the same query contract
    /// (relative path or absolute URL)
    Custom(String),
}

impl Endpoint {
    /// Human readable name, used for logging and titles
    pub fn label(&self) -> &str {
        match self {
            Endpoint::Table(name) => name,
            Endpoint::Custom(path) => path,
        }
    }
}

/// What the grid is currently addressing
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Remote(Endpoint),
    /// Caller-supplied rows; search, sort and paging happen client side
    Static(Vec<RowSnapshot>),
}

impl DataSource {
    pub fn table(name: impl Into<String>) -> Self {
        DataSource::Remote(Endpoint::Table(name.into()))
    }

    pub fn custom(path: impl Into<String>) -> Self {
        DataSource::Remote(Endpoint::Custom(path.into()))
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            DataSource::Remote(endpoint) => Some(endpoint),
            DataSource::Static(_) => None,
        }
    }
}

/// Pagination, sort, search and filter intent for one dataset.
///
/// This is the *committed* query: what fetches are built from. Search and
/// filter text still sitting in a debounce window is not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    /// 1-based page number
    pub page: u64,
    /// Fixed for the lifetime of a grid session
    pub page_size: u64,
    pub sort_key: Option<String>,
    pub sort_direction: SortDirection,
    pub search_term: String,
    /// Column -> substring
    pub filters: BTreeMap<String, String>,
}

impl TableQuery {
    pub fn new(page_size: u64) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            sort_key: None,
            sort_direction: SortDirection::Ascending,
            search_term: String::new(),
            filters: BTreeMap::new(),
        }
    }

    /// Filters that actually constrain the result (non-empty text)
    pub fn active_filters(&self) -> BTreeMap<&str, &str> {
        self.filters
            .iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(col, text)| (col.as_str(), text.as_str()))
            .collect()
    }

    /// Parameters for a paginated list request
    pub fn fetch_params(&self) -> QueryParams {
        QueryParams {
            page: Some(self.page),
            limit: Some(self.page_size),
            ..self.export_params()
        }
    }

    /// Parameters mirroring search/sort/filters without pagination
    pub fn export_params(&self) -> QueryParams {
        let active = self.active_filters();
        let filters = if active.is_empty() {
            None
        } else {
            let object: serde_json::Map<String, Value> = active
                .into_iter()
                .map(|(col, text)| (col.to_string(), Value::String(text.to_string())))
                .collect();
            Some(Value::Object(object).to_string())
        };

        QueryParams {
            page: None,
            limit: None,
            search: (!self.search_term.is_empty()).then(|| self.search_term.clone()),
            sort_by: self.sort_key.clone(),
            descending: self
                .sort_key
                .as_ref()
                .map(|_| self.sort_direction.is_descending()),
            filters,
        }
    }
}

impl Default for TableQuery {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Query string parameters of the list/export contract
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub descending: Option<bool>,
    /// JSON object of column -> substring
    pub filters: Option<String>,
}

impl QueryParams {
    /// Key/value pairs in the order the backend documents them
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(sort_by) = &self.sort_by {
            pairs.push(("sort_by", sort_by.clone()));
        }
        if let Some(descending) = self.descending {
            pairs.push(("descending", descending.to_string()));
        }
        if let Some(filters) = &self.filters {
            pairs.push(("filters", filters.clone()));
        }
        pairs
    }
}

/// Raw list response: `{ data, total?, total_pages?, primary_keys? }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub data: Option<Vec<RowSnapshot>>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub total_pages: Option<u64>,
    #[serde(default)]
    pub primary_keys: Option<Vec<String>>,
}

/// A list response after the pagination fallback has been applied
#[derive(Debug, Clone, PartialEq)]
pub struct TablePage {
    pub rows: Vec<RowSnapshot>,
    pub total: u64,
    pub total_pages: u64,
    pub primary_keys: PrimaryKeySpec,
    /// False when the endpoint did not report a total and the page was taken
    /// to be the whole result set
    pub paginated: bool,
}

impl TablePage {
    pub fn from_response(response: FetchResponse, page_size: u64) -> Self {
        let rows = response.data.unwrap_or_default();
        let primary_keys = response
            .primary_keys
            .map(PrimaryKeySpec::new)
            .unwrap_or_default();

        match response.total {
            Some(total) => {
                let total_pages = response
                    .total_pages
                    .unwrap_or_else(|| total.div_ceil(page_size.max(1)));
                Self {
                    rows,
                    total,
                    total_pages,
                    primary_keys,
                    paginated: true,
                }
            }
            None => {
                tracing::debug!(
                    rows = rows.len(),
                    "List response has no total; treating page as the full result"
                );
                Self {
                    total: rows.len() as u64,
                    total_pages: 1,
                    rows,
                    primary_keys,
                    paginated: false,
                }
            }
        }
    }
}

/// `GET /api/tables` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableList {
    #[serde(default)]
    pub tables: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn fetch_params_include_only_set_parts() {
        let query = TableQuery::new(50);
        assert_eq!(
            query.fetch_params().to_pairs(),
            vec![("page", "1".to_string()), ("limit", "50".to_string())]
        );
    }

    #[test]
    fn fetch_params_with_sort_search_and_filters() {
        let mut query = TableQuery::new(100);
        query.page = 3;
        query.sort_key = Some("vdss_V".into());
        query.sort_direction = SortDirection::Descending;
        query.search_term = "X1".into();
        query.filters.insert("status".into(), "量産".into());
        query.filters.insert("barrier".into(), String::new());

        assert_eq!(
            query.fetch_params().to_pairs(),
            vec![
                ("page", "3".to_string()),
                ("limit", "100".to_string()),
                ("search", "X1".to_string()),
                ("sort_by", "vdss_V".to_string()),
                ("descending", "true".to_string()),
                ("filters", r#"{"status":"量産"}"#.to_string()),
            ]
        );
    }

    #[test]
    fn export_params_drop_pagination() {
        let mut query = TableQuery::new(100);
        query.page = 4;
        query.sort_key = Some("type".into());
        let pairs = query.export_params().to_pairs();
        assert_eq!(
            pairs,
            vec![
                ("sort_by", "type".to_string()),
                ("descending", "false".to_string())
            ]
        );
    }

    #[test]
    fn page_without_total_falls_back_to_single_page() {
        let rows: Vec<RowSnapshot> = (0..12)
            .map(|i| RowSnapshot::from_iter([("id".to_string(), json!(i))]))
            .collect();
        let response = FetchResponse {
            data: Some(rows),
            ..Default::default()
        };

        let page = TablePage::from_response(response, 100);
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 1);
        assert!(!page.paginated);
        assert!(page.primary_keys.is_empty());
    }

    #[test]
    fn page_with_total_but_no_page_count_derives_it() {
        let response: FetchResponse = serde_json::from_value(json!({
            "data": [],
            "total": 201,
            "primary_keys": ["type", "type"]
        }))
        .unwrap();

        let page = TablePage::from_response(response, 100);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.primary_keys.columns(), ["type".to_string()]);
    }

    #[test]
    fn row_snapshot_keeps_server_column_order() {
        let row: RowSnapshot =
            serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
    }
}
