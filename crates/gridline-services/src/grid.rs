//! Async driver for one grid
//!
//! [`TableGrid`] wires the coordinators to a [`TableApi`] and the tokio clock.
//! Callers use it from a single task; nothing here spawns.

use gridline_core::value::display_string;
use gridline_core::{DataSource, GridError, PrimaryKeySpec, Result, RowSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use url::Url;

use crate::api::TableApi;
use crate::edit_session::{CancelOutcome, ConfirmDiscard, EditSessionManager, StartEditOutcome};
use crate::endpoints::ApiBase;
use crate::highlight::HighlightRegistry;
use crate::query_coordinator::{
    ApplyOutcome, GridView, PageSummary, QueryCoordinator, DEFAULT_DEBOUNCE,
};
use crate::save_coordinator::{CommitOutcome, SaveCoordinator, DEFAULT_REVISION_COLUMN};

/// Per-grid tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridOptions {
    pub page_size: u64,
    pub debounce: Duration,
    pub revision_column: String,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            page_size: gridline_core::DEFAULT_PAGE_SIZE,
            debounce: DEFAULT_DEBOUNCE,
            revision_column: DEFAULT_REVISION_COLUMN.to_string(),
        }
    }
}

/// Where [`TableGrid::locate_row`] found the requested row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowLookup {
    /// Index into the page now displayed
    Found(usize),
    Missing,
    Ambiguous,
    /// A page fetch failed part way; the message is the grid's error text
    LoadFailed(String),
}

pub struct TableGrid {
    api: Arc<dyn TableApi>,
    base: ApiBase,
    query: QueryCoordinator,
    edits: EditSessionManager,
    saves: SaveCoordinator,
}

impl TableGrid {
    pub fn new(
        api: Arc<dyn TableApi>,
        base: ApiBase,
        confirm: Arc<dyn ConfirmDiscard>,
        options: GridOptions,
    ) -> Self {
        Self {
            api,
            base,
            query: QueryCoordinator::new(options.page_size, options.debounce),
            edits: EditSessionManager::new(confirm),
            saves: SaveCoordinator::new(options.revision_column),
        }
    }

    pub fn query(&self) -> &QueryCoordinator {
        &self.query
    }

    pub fn edits(&self) -> &EditSessionManager {
        &self.edits
    }

    pub fn highlights(&self) -> &HighlightRegistry {
        self.saves.highlights()
    }

    pub fn rows(&self) -> &[RowSnapshot] {
        self.query.rows()
    }

    pub fn view(&self) -> GridView<'_> {
        self.query.view()
    }

    pub fn page_summary(&self) -> PageSummary {
        self.query.page_summary()
    }

    /// Address `source` and load its first page.
    ///
    /// Returns false, leaving everything as it was, when a dirty edit
    /// session refuses to be discarded.
    pub async fn open(&mut self, source: DataSource) -> bool {
        if !self.edits.confirm_teardown() {
            tracing::debug!("Dataset switch declined; edit session kept");
            return false;
        }
        self.saves.clear_highlights();
        self.edits.set_primary_keys(PrimaryKeySpec::empty());
        self.query.set_dataset(source);
        self.pump().await;
        true
    }

    pub fn set_search_term(&mut self, text: impl Into<String>) {
        self.query.set_search_term(text, Instant::now());
    }

    pub fn set_filter(&mut self, column: impl Into<String>, text: impl Into<String>) {
        self.query.set_filter(column, text, Instant::now());
    }

    pub fn set_sort(&mut self, column: impl Into<String>) {
        self.query.set_sort(column);
    }

    pub fn change_page(&mut self, delta: i64) -> bool {
        self.query.change_page(delta)
    }

    pub fn flush_inputs(&mut self) -> bool {
        self.query.flush_inputs()
    }

    pub fn refresh(&mut self) {
        self.query.refresh();
    }

    /// Commit expired debounces, then run fetches until the query is settled
    pub async fn pump(&mut self) {
        self.query.poll_timers(Instant::now());
        while let Some(ticket) = self.query.take_fetch() {
            let api = Arc::clone(&self.api);
            let result = api.fetch_page(&ticket.endpoint, &ticket.params).await;
            if self.query.apply_response(ticket.seq, result) == ApplyOutcome::Applied {
                self.edits.set_primary_keys(self.query.primary_keys().clone());
            }
        }
    }

    /// Wait out pending debounce windows, then pump
    pub async fn settle(&mut self) {
        while let Some(deadline) = self.query.next_deadline() {
            sleep_until(deadline).await;
            self.query.poll_timers(Instant::now());
        }
        self.pump().await;
    }

    /// Walk the pages of the current query for the single row whose columns
    /// render exactly as `keys`. On `Found` the page holding it is displayed.
    pub async fn locate_row(&mut self, keys: &[(String, String)]) -> RowLookup {
        let mut matches: Vec<(u64, usize)> = Vec::new();
        loop {
            if let GridView::Error(message) = self.query.view() {
                return RowLookup::LoadFailed(message.to_string());
            }
            let page = self.query.query().page;
            matches.extend(
                self.query
                    .rows()
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| row_matches(row, keys))
                    .map(|(index, _)| (page, index)),
            );
            if matches.len() > 1 || !self.page_summary().has_next || !self.change_page(1) {
                break;
            }
            self.pump().await;
        }

        let (page, index) = match matches.as_slice() {
            [found] => *found,
            [] => return RowLookup::Missing,
            _ => return RowLookup::Ambiguous,
        };
        let current = self.query.query().page;
        if page != current {
            self.change_page(page as i64 - current as i64);
            self.pump().await;
            if let GridView::Error(message) = self.query.view() {
                return RowLookup::LoadFailed(message.to_string());
            }
        }
        tracing::debug!(page, index, "Located row");
        RowLookup::Found(index)
    }

    /// Start editing the row at `row_index` of the current page
    pub fn start_edit(&mut self, row_index: usize) -> Result<StartEditOutcome> {
        let row = self
            .query
            .rows()
            .get(row_index)
            .ok_or(GridError::RowOutOfRange(row_index))?;
        Ok(self.edits.start_edit(row))
    }

    pub fn set_field(&mut self, column: &str, raw: &str) -> Result<bool> {
        self.edits.set_field(column, raw)
    }

    /// Save the active session; on success the current page is refetched
    pub async fn commit(&mut self) -> CommitOutcome {
        let outcome = self
            .saves
            .commit(&*self.api, &mut self.edits, &mut self.query)
            .await;
        if matches!(outcome, CommitOutcome::Saved { .. }) {
            self.pump().await;
        }
        outcome
    }

    pub fn cancel_edit(&mut self) -> CancelOutcome {
        self.edits.cancel_edit()
    }

    pub fn export_url(&self) -> Result<Option<Url>> {
        self.query.export_url(&self.base)
    }
}

fn row_matches(row: &RowSnapshot, keys: &[(String, String)]) -> bool {
    keys.iter().all(|(column, expected)| {
        row.get(column)
            .is_some_and(|value| display_string(value) == *expected)
    })
}

impl std::fmt::Debug for TableGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableGrid")
            .field("base", &self.base)
            .field("query", self.query.query())
            .field("edits", &self.edits)
            .finish_non_exhaustive()
    }
}
