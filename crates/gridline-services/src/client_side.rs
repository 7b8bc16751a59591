//! In-memory search, filter, sort and paging for caller-supplied rows

use gridline_core::value::{compare_values, contains_ignore_case, is_blank};
use gridline_core::{RowSnapshot, TableQuery, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPage {
    pub rows: Vec<RowSnapshot>,
    pub total: u64,
    pub total_pages: u64,
}

/// Apply `query` to `rows` the way the server would.
///
/// Blank values (`null` or `""`) always sort last regardless of direction.
pub fn process_rows(rows: &[RowSnapshot], query: &TableQuery) -> ProcessedPage {
    let search = query.search_term.to_lowercase();
    let filters: Vec<(&str, String)> = query
        .active_filters()
        .into_iter()
        .map(|(col, text)| (col, text.to_lowercase()))
        .collect();

    let mut matched: Vec<&RowSnapshot> = rows
        .iter()
        .filter(|row| search.is_empty() || row.values().any(|v| contains_ignore_case(v, &search)))
        .filter(|row| {
            filters.iter().all(|(col, text)| {
                row.get(*col)
                    .is_some_and(|value| contains_ignore_case(value, text))
            })
        })
        .collect();

    if let Some(key) = &query.sort_key {
        let descending = query.sort_direction.is_descending();
        matched.sort_by(|a, b| compare_for_sort(a.get(key), b.get(key), descending));
    }

    let total = matched.len() as u64;
    let page_size = query.page_size.max(1);
    let total_pages = total.div_ceil(page_size).max(1);
    let start = (query.page.saturating_sub(1) * page_size) as usize;

    let rows = matched
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .cloned()
        .collect();

    ProcessedPage {
        rows,
        total,
        total_pages,
    }
}

fn compare_for_sort(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    let a_blank = a.is_none_or(is_blank);
    let b_blank = b.is_none_or(is_blank);
    match (a, b) {
        _ if a_blank && b_blank => Ordering::Equal,
        _ if a_blank => Ordering::Greater,
        _ if b_blank => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = compare_values(a, b);
            if descending { ord.reverse() } else { ord }
        }
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridline_core::SortDirection;
    use serde_json::json;

    fn rows() -> Vec<RowSnapshot> {
        [
            json!({"type": "X1", "vdss_V": 30, "status": "active"}),
            json!({"type": "X2", "vdss_V": null, "status": "Retired"}),
            json!({"type": "Y7", "vdss_V": 600, "status": "active"}),
            json!({"type": "Z9", "vdss_V": 45, "status": ""}),
        ]
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap())
        .collect()
    }

    fn types(page: &ProcessedPage) -> Vec<String> {
        page.rows
            .iter()
            .map(|r| r["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn search_is_case_insensitive_across_all_values() {
        let mut query = TableQuery::new(100);
        query.search_term = "retired".into();
        let page = process_rows(&rows(), &query);
        assert_eq!(types(&page), vec!["X2"]);
        assert_eq!(page.total, 1);
    }

    #[test]
    fn sort_puts_blanks_last_in_both_directions() {
        let mut query = TableQuery::new(100);
        query.sort_key = Some("vdss_V".into());
        assert_eq!(types(&process_rows(&rows(), &query)), vec!["X1", "Z9", "Y7", "X2"]);

        query.sort_direction = SortDirection::Descending;
        assert_eq!(types(&process_rows(&rows(), &query)), vec!["Y7", "Z9", "X1", "X2"]);
    }

    #[test]
    fn filters_match_per_column_substrings() {
        let mut query = TableQuery::new(100);
        query.filters.insert("status".into(), "ACT".into());
        query.filters.insert("type".into(), String::new());
        assert_eq!(types(&process_rows(&rows(), &query)), vec!["X1", "Y7"]);
    }

    #[test]
    fn pagination_slices_after_filtering() {
        let mut query = TableQuery::new(3);
        query.page = 2;
        let page = process_rows(&rows(), &query);
        assert_eq!(page.total, 4);
        assert_eq!(page.total_pages, 2);
        assert_eq!(types(&page), vec!["Z9"]);
    }

    #[test]
    fn empty_input_still_has_one_page() {
        let page = process_rows(&[], &TableQuery::new(100));
        assert_eq!(page.total, 0);
        assert_eq!(page.total_pages, 1);
        assert!(page.rows.is_empty());
    }
}
