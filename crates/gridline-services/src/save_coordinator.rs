//! Save Coordinator
//!
//! Turns the active edit session into a partial update, guards against
//! duplicate submits, and reconciles the outcome: highlights and a refetch on
//! success, an inline error with input preserved on failure. Saved values are
//! never written into the local page; the refetch is authoritative.

use gridline_core::{Endpoint, Result, RowKey, RowSnapshot};
use indexmap::IndexMap;

use crate::api::TableApi;
use crate::edit_session::EditSessionManager;
use crate::highlight::HighlightRegistry;
use crate::models::SaveRequest;
use crate::query_coordinator::QueryCoordinator;

/// Revision column sent as the optimistic-concurrency token
pub const DEFAULT_REVISION_COLUMN: &str = "更新日";

/// A save the caller must submit
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    pub row_key: RowKey,
    pub endpoint: Endpoint,
    pub request: SaveRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitStep {
    /// Nothing was dirty; the session was closed without a request
    Closed,
    Submit(SaveTicket),
    /// A save for this session is already in flight
    Suppressed,
    NoSession,
    /// No primary key or no editable endpoint
    NotAddressable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Closed,
    Saved {
        row_key: RowKey,
        columns: Vec<String>,
    },
    /// The session stays open with this message
    Failed(String),
    Suppressed,
    NoSession,
    NotAddressable,
}

#[derive(Debug)]
pub struct SaveCoordinator {
    highlights: HighlightRegistry,
    in_flight: Option<RowKey>,
    revision_column: String,
}

impl SaveCoordinator {
    pub fn new(revision_column: impl Into<String>) -> Self {
        Self {
            highlights: HighlightRegistry::new(),
            in_flight: None,
            revision_column: revision_column.into(),
        }
    }

    pub fn highlights(&self) -> &HighlightRegistry {
        &self.highlights
    }

    /// Dataset switched
    pub fn clear_highlights(&mut self) {
        self.highlights.clear();
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn revision_column(&self) -> &str {
        &self.revision_column
    }

    /// First half of a commit: validate and build the request.
    pub fn begin_commit(
        &mut self,
        edits: &mut EditSessionManager,
        query: &QueryCoordinator,
    ) -> CommitStep {
        if self.in_flight.is_some() || edits.is_saving() {
            tracing::debug!("Duplicate save suppressed");
            return CommitStep::Suppressed;
        }
        let Some(session) = edits.session() else {
            return CommitStep::NoSession;
        };
        if !session.is_dirty() {
            tracing::debug!(row_key = %session.row_key(), "Nothing to save; closing edit session");
            edits.clear();
            return CommitStep::Closed;
        }

        let primary_keys = edits.primary_keys();
        let endpoint = query.source().and_then(|source| source.endpoint());
        let Some(endpoint) = endpoint.filter(|_| !primary_keys.is_empty()) else {
            return CommitStep::NotAddressable;
        };

        let original = session.original();
        let primary_key_values: IndexMap<_, _> = primary_keys
            .columns()
            .iter()
            .map(|column| {
                let value = original.get(column).cloned().unwrap_or_default();
                (column.clone(), value)
            })
            .collect();
        let concurrency_token = original
            .get(&self.revision_column)
            .filter(|value| !value.is_null())
            .cloned();

        let ticket = SaveTicket {
            row_key: session.row_key().clone(),
            endpoint: endpoint.clone(),
            request: SaveRequest {
                primary_key_values,
                changes: session.changes(),
                concurrency_token,
            },
        };

        tracing::info!(
            endpoint = %ticket.endpoint.label(),
            row_key = %ticket.row_key,
            columns = ticket.request.changes.len(),
            "Saving row"
        );
        self.in_flight = Some(ticket.row_key.clone());
        edits.mark_saving();
        CommitStep::Submit(ticket)
    }

    /// Second half of a commit: reconcile the server's answer.
    pub fn complete_commit(
        &mut self,
        ticket: SaveTicket,
        result: Result<Option<RowSnapshot>>,
        edits: &mut EditSessionManager,
        query: &mut QueryCoordinator,
    ) -> CommitOutcome {
        self.in_flight = None;
        match result {
            Ok(_) => {
                let columns: Vec<String> = ticket.request.changes.keys().cloned().collect();
                self.highlights
                    .merge(ticket.row_key.clone(), columns.iter().cloned());
                edits.clear();
                query.refresh();
                tracing::info!(row_key = %ticket.row_key, "Row saved");
                CommitOutcome::Saved {
                    row_key: ticket.row_key,
                    columns,
                }
            }
            Err(err) => {
                tracing::warn!(row_key = %ticket.row_key, error = %err, "Save failed");
                let message = err.user_message();
                edits.save_failed(message.clone());
                CommitOutcome::Failed(message)
            }
        }
    }

    /// Validate, submit through `api` and reconcile
    pub async fn commit(
        &mut self,
        api: &dyn TableApi,
        edits: &mut EditSessionManager,
        query: &mut QueryCoordinator,
    ) -> CommitOutcome {
        match self.begin_commit(edits, query) {
            CommitStep::Submit(ticket) => {
                let result = api.update_row(&ticket.endpoint, &ticket.request).await;
                self.complete_commit(ticket, result, edits, query)
            }
            CommitStep::Closed => CommitOutcome::Closed,
            CommitStep::Suppressed => CommitOutcome::Suppressed,
            CommitStep::NoSession => CommitOutcome::NoSession,
            CommitStep::NotAddressable => CommitOutcome::NotAddressable,
        }
    }
}

impl Default for SaveCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_REVISION_COLUMN)
    }
}
