//! Edit Session Manager
//!
//! At most one row is edited at a time. The session keeps the row as it was
//! when editing started, a working copy, and the set of columns whose working
//! value differs from the original by rendered text.
//!
//! Discarding dirty input always passes through an injected
//! [`ConfirmDiscard`] gate.

use gridline_core::value::{coerce_input, same_display};
use gridline_core::{compute_row_key, GridError, PrimaryKeySpec, Result, RowKey, RowSnapshot, Value};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Decides whether pending changes may be thrown away
pub trait ConfirmDiscard: Send + Sync {
    fn confirm_discard(&self, dirty_fields: &BTreeSet<String>) -> bool;
}

impl<F> ConfirmDiscard for F
where
    F: Fn(&BTreeSet<String>) -> bool + Send + Sync,
{
    fn confirm_discard(&self, dirty_fields: &BTreeSet<String>) -> bool {
        self(dirty_fields)
    }
}

/// Gate that approves every discard (non-interactive callers)
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl ConfirmDiscard for AutoConfirm {
    fn confirm_discard(&self, _dirty_fields: &BTreeSet<String>) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    target_row_key: RowKey,
    original: RowSnapshot,
    working: RowSnapshot,
    dirty: BTreeSet<String>,
}

impl EditSession {
    pub fn row_key(&self) -> &RowKey {
        &self.target_row_key
    }

    /// The row as it was when editing started
    pub fn original(&self) -> &RowSnapshot {
        &self.original
    }

    pub fn working(&self) -> &RowSnapshot {
        &self.working
    }

    pub fn dirty_fields(&self) -> &BTreeSet<String> {
        &self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty columns with their working values, in row column order
    pub fn changes(&self) -> IndexMap<String, Value> {
        self.working
            .iter()
            .filter(|(column, _)| self.dirty.contains(*column))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditPhase {
    #[default]
    Idle,
    Editing,
    Saving,
    /// The last save failed; input is preserved and the message stays
    /// visible until the next commit or cancel
    EditingWithError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartEditOutcome {
    Started(RowKey),
    /// The dataset has no primary key
    NotEditable,
    /// Another row has dirty input and the discard was refused
    Declined,
    /// A save is in flight
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    Declined,
    NoSession,
    Busy,
}

pub struct EditSessionManager {
    primary_keys: PrimaryKeySpec,
    session: Option<EditSession>,
    phase: EditPhase,
    notice: Option<String>,
    confirm: Arc<dyn ConfirmDiscard>,
}

impl EditSessionManager {
    pub fn new(confirm: Arc<dyn ConfirmDiscard>) -> Self {
        Self {
            primary_keys: PrimaryKeySpec::empty(),
            session: None,
            phase: EditPhase::Idle,
            notice: None,
            confirm,
        }
    }

    /// Identity columns from the latest fetch
    pub fn set_primary_keys(&mut self, primary_keys: PrimaryKeySpec) {
        self.primary_keys = primary_keys;
    }

    pub fn primary_keys(&self) -> &PrimaryKeySpec {
        &self.primary_keys
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn phase(&self) -> &EditPhase {
        &self.phase
    }

    /// Message for the last refused edit attempt
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.phase {
            EditPhase::EditingWithError(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.session.as_ref().is_some_and(EditSession::is_dirty)
    }

    pub fn is_saving(&self) -> bool {
        self.phase == EditPhase::Saving
    }

    /// Open an edit session on `row`.
    ///
    /// Starting on a different row while one is open is an implicit cancel:
    /// dirty input must be confirmed away first. Starting on the row already
    /// being edited keeps its session.
    pub fn start_edit(&mut self, row: &RowSnapshot) -> StartEditOutcome {
        if self.primary_keys.is_empty() {
            let message = GridError::NotAddressable.user_message();
            tracing::info!("{}", message);
            self.notice = Some(message);
            return StartEditOutcome::NotEditable;
        }
        if self.is_saving() {
            return StartEditOutcome::Busy;
        }

        let row_key = compute_row_key(row, &self.primary_keys);
        if let Some(current) = &self.session {
            if current.target_row_key == row_key {
                return StartEditOutcome::Started(row_key);
            }
            if current.is_dirty() && !self.confirm.confirm_discard(&current.dirty) {
                tracing::debug!(row_key = %current.target_row_key, "Kept dirty edit session");
                return StartEditOutcome::Declined;
            }
        }

        tracing::debug!(row_key = %row_key, "Edit session started");
        self.notice = None;
        self.phase = EditPhase::Editing;
        self.session = Some(EditSession {
            target_row_key: row_key.clone(),
            original: row.clone(),
            working: row.clone(),
            dirty: BTreeSet::new(),
        });
        StartEditOutcome::Started(row_key)
    }

    /// Store editor input for `column`, coerced against its original value.
    ///
    /// Returns whether the column is dirty afterwards.
    pub fn set_field(&mut self, column: &str, raw: &str) -> Result<bool> {
        if self.is_saving() {
            return Err(GridError::SaveInProgress);
        }
        let session = self.session.as_mut().ok_or(GridError::NoActiveEdit)?;
        if self.primary_keys.contains(column) {
            return Err(GridError::ReadOnlyColumn(column.to_string()));
        }
        let original = session
            .original
            .get(column)
            .ok_or_else(|| GridError::UnknownColumn(column.to_string()))?;

        let value = coerce_input(Some(original), raw);
        let dirty = !same_display(&value, original);
        if dirty {
            session.dirty.insert(column.to_string());
        } else {
            session.dirty.remove(column);
        }
        session.working.insert(column.to_string(), value);
        Ok(dirty)
    }

    pub fn cancel_edit(&mut self) -> CancelOutcome {
        if self.is_saving() {
            return CancelOutcome::Busy;
        }
        let Some(session) = &self.session else {
            return CancelOutcome::NoSession;
        };
        if session.is_dirty() && !self.confirm.confirm_discard(&session.dirty) {
            return CancelOutcome::Declined;
        }
        tracing::debug!(row_key = %session.target_row_key, "Edit session cancelled");
        self.clear();
        CancelOutcome::Cancelled
    }

    /// Gate for switching datasets or leaving the grid.
    ///
    /// Returns true when teardown may proceed; any session is then closed.
    /// Never proceeds while a save is in flight.
    pub fn confirm_teardown(&mut self) -> bool {
        if self.is_saving() {
            return false;
        }
        match &self.session {
            Some(session) if session.is_dirty() => {
                if !self.confirm.confirm_discard(&session.dirty) {
                    return false;
                }
            }
            _ => {}
        }
        self.clear();
        true
    }

    pub(crate) fn mark_saving(&mut self) {
        self.phase = EditPhase::Saving;
    }

    pub(crate) fn save_failed(&mut self, message: String) {
        self.phase = EditPhase::EditingWithError(message);
    }

    /// Close the session after a successful or empty commit
    pub(crate) fn clear(&mut self) {
        self.session = None;
        self.phase = EditPhase::Idle;
    }
}

impl std::fmt::Debug for EditSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditSessionManager")
            .field("primary_keys", &self.primary_keys)
            .field("session", &self.session)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
