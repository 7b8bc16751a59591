//! Query Coordinator
//!
//! Owns the committed [`TableQuery`] for the addressed dataset, the debounced
//! search and filter inputs, and the current page of rows.
//!
//! The coordinator performs no I/O. Callers drain [`QueryCoordinator::take_fetch`]
//! for a [`FetchTicket`], run the request, and hand the result back through
//! [`QueryCoordinator::apply_response`] together with the ticket's sequence
//! number. Only the most recently issued ticket is ever applied; responses to
//! older tickets are dropped regardless of arrival order.

use gridline_core::{
    DataSource, Endpoint, FetchResponse, PrimaryKeySpec, QueryParams, Result, RowSnapshot,
    SortDirection, TablePage, TableQuery,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

use crate::client_side::process_rows;
use crate::debounce::Debounced;
use crate::endpoints::ApiBase;
use crate::export;

/// Quiet period applied to search and filter input
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Fetch lifecycle of the current dataset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// No dataset addressed yet
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// A fetch the caller must perform
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub seq: u64,
    pub endpoint: Endpoint,
    pub params: QueryParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A newer request was issued after this one; the response was dropped
    Stale,
}

/// What the grid body should display
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridView<'a> {
    NoDataset,
    /// First load of a dataset or query with nothing to show yet
    Loading,
    Error(&'a str),
    /// Loaded successfully, zero rows
    NoMatches,
    Rows(&'a [RowSnapshot]),
}

/// Pagination footer data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    pub page: u64,
    pub total_pages: u64,
    pub total: u64,
    /// 1-based index of the first row on this page, 0 when empty
    pub first_row: u64,
    pub last_row: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

pub struct QueryCoordinator {
    source: Option<DataSource>,
    query: TableQuery,
    search_input: String,
    filter_input: BTreeMap<String, String>,
    pending_search: Debounced<String>,
    pending_filters: Debounced<BTreeMap<String, String>>,
    rows: Vec<RowSnapshot>,
    total: u64,
    total_pages: u64,
    primary_keys: PrimaryKeySpec,
    paginated: bool,
    state: LoadState,
    last_seq: u64,
    awaiting: Option<u64>,
    needs_fetch: bool,
}

impl QueryCoordinator {
    pub fn new(page_size: u64, debounce: Duration) -> Self {
        Self {
            source: None,
            query: TableQuery::new(page_size),
            search_input: String::new(),
            filter_input: BTreeMap::new(),
            pending_search: Debounced::new(debounce),
            pending_filters: Debounced::new(debounce),
            rows: Vec::new(),
            total: 0,
            total_pages: 1,
            primary_keys: PrimaryKeySpec::empty(),
            paginated: true,
            state: LoadState::Idle,
            last_seq: 0,
            awaiting: None,
            needs_fetch: false,
        }
    }

    /// Address a new dataset.
    ///
    /// The query is recreated (page 1, no search, filters or sort), pending
    /// input is dropped and any in-flight response will be treated as stale.
    pub fn set_dataset(&mut self, source: DataSource) {
        let page_size = self.query.page_size;
        self.query = TableQuery::new(page_size);
        self.search_input.clear();
        self.filter_input.clear();
        self.pending_search.cancel();
        self.pending_filters.cancel();
        self.rows.clear();
        self.total = 0;
        self.total_pages = 1;
        self.primary_keys = PrimaryKeySpec::empty();
        self.paginated = true;
        self.awaiting = None;

        match &source {
            DataSource::Remote(endpoint) => {
                tracing::debug!(endpoint = %endpoint.label(), "Addressing remote dataset");
            }
            DataSource::Static(rows) => {
                tracing::debug!(rows = rows.len(), "Addressing static dataset");
            }
        }
        self.source = Some(source);
        self.state = LoadState::Loading;
        self.invalidate();
    }

    pub fn source(&self) -> Option<&DataSource> {
        self.source.as_ref()
    }

    /// The committed query
    pub fn query(&self) -> &TableQuery {
        &self.query
    }

    /// Search text as typed, possibly not committed yet
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    /// Filter text as typed, possibly not committed yet
    pub fn filter_input(&self) -> &BTreeMap<String, String> {
        &self.filter_input
    }

    pub fn rows(&self) -> &[RowSnapshot] {
        &self.rows
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    /// Identity columns reported by the latest applied response
    pub fn primary_keys(&self) -> &PrimaryKeySpec {
        &self.primary_keys
    }

    /// False when the endpoint did not report totals
    pub fn is_paginated(&self) -> bool {
        self.paginated
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.awaiting.is_some()
    }

    pub fn set_search_term(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        self.search_input.clone_from(&text);
        self.pending_search.schedule(text, now);
    }

    /// Edit one column filter. All filters commit together once input has
    /// been quiet for the debounce period.
    pub fn set_filter(&mut self, column: impl Into<String>, text: impl Into<String>, now: Instant) {
        self.filter_input.insert(column.into(), text.into());
        self.pending_filters.schedule(self.filter_input.clone(), now);
    }

    /// Earliest instant at which [`poll_timers`](Self::poll_timers) has work
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.pending_search.deadline(), self.pending_filters.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Commit debounced input whose quiet period has elapsed.
    ///
    /// Returns true when the committed query changed.
    pub fn poll_timers(&mut self, now: Instant) -> bool {
        let search = self.pending_search.poll(now);
        let filters = self.pending_filters.poll(now);
        self.commit_inputs(search, filters)
    }

    /// Commit all pending input immediately
    pub fn flush_inputs(&mut self) -> bool {
        let search = self.pending_search.flush();
        let filters = self.pending_filters.flush();
        self.commit_inputs(search, filters)
    }

    fn commit_inputs(
        &mut self,
        search: Option<String>,
        filters: Option<BTreeMap<String, String>>,
    ) -> bool {
        if search.is_none() && filters.is_none() {
            return false;
        }

        let before = self.query.clone();
        if let Some(term) = search {
            self.query.search_term = term;
            self.query.page = 1;
        }
        if let Some(filters) = filters {
            self.query.filters = filters;
            self.query.page = 1;
        }

        let changed = self.query != before;
        if changed {
            tracing::debug!(
                search = %self.query.search_term,
                filters = self.query.active_filters().len(),
                "Committed search/filter input"
            );
            self.invalidate();
        }
        changed
    }

    /// Toggle ascending/descending on the current sort column, or sort a new
    /// column ascending. Takes effect immediately and keeps the page.
    pub fn set_sort(&mut self, column: impl Into<String>) {
        let column = column.into();
        let same_column = self.query.sort_key.as_deref() == Some(column.as_str());
        self.query.sort_direction =
            if same_column && self.query.sort_direction == SortDirection::Ascending {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
        self.query.sort_key = Some(column);
        tracing::debug!(
            sort_by = ?self.query.sort_key,
            direction = self.query.sort_direction.label(),
            "Sort changed"
        );
        self.invalidate();
    }

    /// Move by `delta` pages, clamped to the known page range.
    ///
    /// Returns true when the page actually changed.
    pub fn change_page(&mut self, delta: i64) -> bool {
        let last = self.total_pages.max(1) as i64;
        let target = (self.query.page as i64).saturating_add(delta).clamp(1, last) as u64;
        if target == self.query.page {
            return false;
        }
        self.query.page = target;
        self.invalidate();
        true
    }

    /// Re-read the current page with the committed query
    pub fn refresh(&mut self) {
        self.invalidate();
    }

    /// Whether a remote fetch is due
    pub fn needs_fetch(&self) -> bool {
        self.needs_fetch
    }

    /// Issue the pending fetch, if any, under a fresh sequence number
    pub fn take_fetch(&mut self) -> Option<FetchTicket> {
        if !self.needs_fetch {
            return None;
        }
        self.needs_fetch = false;

        let endpoint = self.source.as_ref()?.endpoint()?.clone();
        self.last_seq += 1;
        self.awaiting = Some(self.last_seq);
        self.state = LoadState::Loading;

        let ticket = FetchTicket {
            seq: self.last_seq,
            endpoint,
            params: self.query.fetch_params(),
        };
        tracing::debug!(
            seq = ticket.seq,
            endpoint = %ticket.endpoint.label(),
            page = self.query.page,
            "Issuing fetch"
        );
        Some(ticket)
    }

    /// Apply the outcome of the fetch issued under `seq`
    pub fn apply_response(&mut self, seq: u64, result: Result<FetchResponse>) -> ApplyOutcome {
        if self.awaiting != Some(seq) {
            tracing::debug!(seq, latest = self.last_seq, "Discarding stale fetch response");
            return ApplyOutcome::Stale;
        }
        self.awaiting = None;

        match result {
            Ok(response) => {
                let page = TablePage::from_response(response, self.query.page_size);
                self.rows = page.rows;
                self.total = page.total;
                self.total_pages = page.total_pages;
                self.primary_keys = page.primary_keys;
                self.paginated = page.paginated;
                self.state = LoadState::Loaded;
                tracing::debug!(
                    seq,
                    rows = self.rows.len(),
                    total = self.total,
                    total_pages = self.total_pages,
                    "Applied fetch response"
                );

                if self.clamp_page() {
                    tracing::debug!(page = self.query.page, "Page out of range; refetching");
                    self.needs_fetch = true;
                }
            }
            Err(err) => {
                tracing::warn!(seq, error = %err, "Fetch failed");
                self.state = LoadState::Failed(err.user_message());
            }
        }
        ApplyOutcome::Applied
    }

    pub fn view(&self) -> GridView<'_> {
        if self.source.is_none() {
            return GridView::NoDataset;
        }
        match &self.state {
            LoadState::Failed(message) => GridView::Error(message),
            LoadState::Loading | LoadState::Idle if self.rows.is_empty() => GridView::Loading,
            _ if self.rows.is_empty() => GridView::NoMatches,
            _ => GridView::Rows(&self.rows),
        }
    }

    pub fn page_summary(&self) -> PageSummary {
        let page = self.query.page;
        let size = self.query.page_size;
        let total = self.total;
        let total_pages = self.total_pages.max(1);
        let first_row = if total == 0 { 0 } else { (page - 1) * size + 1 };
        PageSummary {
            page,
            total_pages,
            total,
            first_row,
            last_row: (page * size).min(total),
            has_previous: page > 1,
            has_next: page < total_pages,
        }
    }

    /// Download URL mirroring the committed search, sort and filters
    pub fn export_url(&self, base: &ApiBase) -> Result<Option<Url>> {
        match &self.source {
            Some(source) => export::export_url(base, source, &self.query),
            None => Ok(None),
        }
    }

    fn clamp_page(&mut self) -> bool {
        let clamped = self.query.page.clamp(1, self.total_pages.max(1));
        let changed = clamped != self.query.page;
        self.query.page = clamped;
        changed
    }

    /// Mark the committed query as needing new rows. Static data is
    /// reprocessed in place; remote data waits for `take_fetch`.
    fn invalidate(&mut self) {
        match &self.source {
            Some(DataSource::Static(all_rows)) => {
                let mut processed = process_rows(all_rows, &self.query);
                let clamped = self.query.page.clamp(1, processed.total_pages);
                if clamped != self.query.page {
                    self.query.page = clamped;
                    processed = process_rows(all_rows, &self.query);
                }
                self.rows = processed.rows;
                self.total = processed.total;
                self.total_pages = processed.total_pages;
                self.paginated = true;
                self.state = LoadState::Loaded;
            }
            Some(DataSource::Remote(_)) => self.needs_fetch = true,
            None => {}
        }
    }
}

impl Default for QueryCoordinator {
    fn default() -> Self {
        Self::new(gridline_core::DEFAULT_PAGE_SIZE, DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridline_core::GridError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rows(n: usize) -> Vec<RowSnapshot> {
        (0..n)
            .map(|i| serde_json::from_value(json!({"id": i, "name": format!("row {}", i)})).unwrap())
            .collect()
    }

    fn response(n: usize, total: u64, total_pages: u64) -> FetchResponse {
        FetchResponse {
            data: Some(rows(n)),
            total: Some(total),
            total_pages: Some(total_pages),
            primary_keys: Some(vec!["id".into()]),
        }
    }

    fn loaded(total_pages: u64) -> QueryCoordinator {
        let mut coordinator = QueryCoordinator::default();
        coordinator.set_dataset(DataSource::table("devices"));
        let ticket = coordinator.take_fetch().unwrap();
        coordinator.apply_response(ticket.seq, Ok(response(3, total_pages * 100, total_pages)));
        coordinator
    }

    #[test]
    fn new_dataset_requests_first_page() {
        let mut coordinator = QueryCoordinator::default();
        assert_eq!(coordinator.view(), GridView::NoDataset);
        assert!(coordinator.take_fetch().is_none());

        coordinator.set_dataset(DataSource::table("devices"));
        assert_eq!(coordinator.view(), GridView::Loading);
        let ticket = coordinator.take_fetch().unwrap();
        assert_eq!(ticket.endpoint, Endpoint::Table("devices".into()));
        assert_eq!(ticket.params.page, Some(1));
        assert_eq!(ticket.params.limit, Some(100));
        assert!(coordinator.take_fetch().is_none());
    }

    #[test]
    fn search_commits_once_after_quiet_period() {
        let mut coordinator = loaded(5);
        coordinator.change_page(2);
        coordinator.take_fetch();
        let start = Instant::now();

        coordinator.set_search_term("X", start);
        coordinator.set_search_term("X1", start + Duration::from_millis(200));
        assert_eq!(coordinator.search_input(), "X1");
        assert!(!coordinator.poll_timers(start + Duration::from_millis(600)));
        assert_eq!(coordinator.query().search_term, "");

        assert!(coordinator.poll_timers(start + Duration::from_millis(700)));
        assert_eq!(coordinator.query().search_term, "X1");
        assert_eq!(coordinator.query().page, 1);
        assert!(coordinator.take_fetch().is_some());
        assert!(!coordinator.poll_timers(start + Duration::from_secs(5)));
    }

    #[test]
    fn filters_batch_commit_together() {
        let mut coordinator = loaded(1);
        let start = Instant::now();
        coordinator.set_filter("status", "active", start);
        coordinator.set_filter("barrier", "Ti", start + Duration::from_millis(100));
        assert_eq!(
            coordinator.next_deadline(),
            Some(start + Duration::from_millis(600))
        );

        assert!(coordinator.poll_timers(start + Duration::from_millis(600)));
        assert_eq!(coordinator.query().active_filters().len(), 2);
        let ticket = coordinator.take_fetch().unwrap();
        assert_eq!(
            ticket.params.filters.as_deref(),
            Some(r#"{"barrier":"Ti","status":"active"}"#)
        );
    }

    #[test]
    fn sort_toggles_on_same_column_and_resets_on_new_column() {
        let mut coordinator = loaded(3);
        coordinator.set_sort("vdss_V");
        assert_eq!(coordinator.query().sort_direction, SortDirection::Ascending);
        coordinator.set_sort("vdss_V");
        assert_eq!(coordinator.query().sort_direction, SortDirection::Descending);
        coordinator.set_sort("vdss_V");
        assert_eq!(coordinator.query().sort_direction, SortDirection::Ascending);
        coordinator.set_sort("vdss_V");
        coordinator.set_sort("type");
        assert_eq!(coordinator.query().sort_key.as_deref(), Some("type"));
        assert_eq!(coordinator.query().sort_direction, SortDirection::Ascending);
    }

    #[test]
    fn sort_keeps_page() {
        let mut coordinator = loaded(3);
        coordinator.change_page(1);
        coordinator.set_sort("type");
        assert_eq!(coordinator.query().page, 2);
    }

    #[test]
    fn change_page_is_clamped() {
        let mut coordinator = loaded(3);
        assert!(!coordinator.change_page(-1));
        assert!(coordinator.change_page(10));
        assert_eq!(coordinator.query().page, 3);
        assert!(coordinator.change_page(-10));
        assert_eq!(coordinator.query().page, 1);
    }

    #[test]
    fn stale_response_is_discarded() {
        let mut coordinator = loaded(1);
        coordinator.refresh();
        let first = coordinator.take_fetch().unwrap();
        coordinator.set_sort("name");
        let second = coordinator.take_fetch().unwrap();
        assert!(second.seq > first.seq);

        assert_eq!(
            coordinator.apply_response(second.seq, Ok(response(2, 2, 1))),
            ApplyOutcome::Applied
        );
        assert_eq!(
            coordinator.apply_response(first.seq, Ok(response(7, 7, 1))),
            ApplyOutcome::Stale
        );
        assert_eq!(coordinator.rows().len(), 2);
    }

    #[test]
    fn rows_stay_visible_during_refetch() {
        let mut coordinator = loaded(1);
        coordinator.refresh();
        coordinator.take_fetch();
        assert!(coordinator.is_loading());
        assert!(matches!(coordinator.view(), GridView::Rows(rows) if rows.len() == 3));
    }

    #[test]
    fn failure_replaces_display_and_does_not_retry() {
        let mut coordinator = QueryCoordinator::default();
        coordinator.set_dataset(DataSource::table("devices"));
        let ticket = coordinator.take_fetch().unwrap();
        coordinator.apply_response(ticket.seq, Err(GridError::Transport("connection refused".into())));
        assert_eq!(
            coordinator.view(),
            GridView::Error("Transport error: connection refused")
        );
        assert!(!coordinator.needs_fetch());
    }

    #[test]
    fn empty_page_is_not_an_error() {
        let mut coordinator = QueryCoordinator::default();
        coordinator.set_dataset(DataSource::table("devices"));
        let ticket = coordinator.take_fetch().unwrap();
        coordinator.apply_response(ticket.seq, Ok(response(0, 0, 0)));
        assert_eq!(coordinator.view(), GridView::NoMatches);
        let summary = coordinator.page_summary();
        assert_eq!(summary.first_row, 0);
        assert_eq!(summary.total_pages, 1);
        assert!(!summary.has_next);
    }

    #[test]
    fn page_beyond_range_after_response_is_clamped_and_refetched() {
        let mut coordinator = loaded(5);
        coordinator.change_page(4);
        let ticket = coordinator.take_fetch().unwrap();
        coordinator.apply_response(ticket.seq, Ok(response(0, 150, 2)));
        assert_eq!(coordinator.query().page, 2);
        assert!(coordinator.needs_fetch());
    }

    #[test]
    fn missing_total_disables_pagination() {
        let mut coordinator = QueryCoordinator::default();
        coordinator.set_dataset(DataSource::custom("/api/user/devices"));
        let ticket = coordinator.take_fetch().unwrap();
        coordinator.apply_response(
            ticket.seq,
            Ok(FetchResponse {
                data: Some(rows(12)),
                ..Default::default()
            }),
        );
        assert_eq!(coordinator.total(), 12);
        assert_eq!(coordinator.total_pages(), 1);
        assert!(!coordinator.is_paginated());
        let summary = coordinator.page_summary();
        assert!(!summary.has_previous && !summary.has_next);
        assert_eq!((summary.first_row, summary.last_row), (1, 12));
    }

    #[test]
    fn switching_dataset_resets_query_and_drops_in_flight() {
        let mut coordinator = loaded(3);
        coordinator.set_sort("name");
        coordinator.set_search_term("abc", Instant::now());
        let in_flight = coordinator.take_fetch().unwrap();

        coordinator.set_dataset(DataSource::table("spec_sheets"));
        assert_eq!(coordinator.query(), &TableQuery::new(100));
        assert_eq!(coordinator.search_input(), "");
        assert_eq!(coordinator.next_deadline(), None);
        assert_eq!(
            coordinator.apply_response(in_flight.seq, Ok(response(1, 1, 1))),
            ApplyOutcome::Stale
        );
    }

    #[test]
    fn static_rows_never_fetch() {
        let mut coordinator = QueryCoordinator::new(5, DEFAULT_DEBOUNCE);
        coordinator.set_dataset(DataSource::Static(rows(12)));
        assert!(coordinator.take_fetch().is_none());
        assert_eq!(coordinator.total_pages(), 3);
        assert_eq!(coordinator.rows().len(), 5);

        coordinator.change_page(5);
        assert_eq!(coordinator.query().page, 3);
        assert_eq!(coordinator.rows().len(), 2);

        coordinator.set_search_term("row 1", Instant::now());
        coordinator.flush_inputs();
        assert_eq!(coordinator.query().page, 1);
        // "row 1", "row 10", "row 11"
        assert_eq!(coordinator.total(), 3);
        assert!(coordinator.primary_keys().is_empty());
    }
}
