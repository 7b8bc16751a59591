//! Gridline Services Layer
//!
//! This crate holds the state machines behind a server-synchronized data
//! grid and the HTTP access they need.
//!
//! # Architecture
//!
//! ```text
//! Front end (gridline-cli, or any UI)
//!     ↓
//! TableGrid / DetailRecordEditor   ← async drivers
//!     ↓
//! QueryCoordinator, EditSessionManager, SaveCoordinator   ← no I/O
//!     ↓
//! TableApi (HttpTableApi over reqwest)
//!     ↓
//! gridline-core
//! ```
//!
//! # Components
//!
//! - [`QueryCoordinator`] - Pagination, sort, debounced search/filter, fetch sequencing
//! - [`EditSessionManager`] - The single active row edit and its dirty fields
//! - [`SaveCoordinator`] - Partial updates, single-flight guard, highlights
//! - [`export_url`] - Download URL for the current view
//! - [`DetailRecordEditor`] - Record-level editing of a device
//! - [`TableGrid`] - Drives the above against a [`TableApi`]
//!
//! The coordinators take explicit instants and return tickets instead of
//! performing requests, so every transition can be tested without a runtime.

mod api;
mod client_side;
mod debounce;
mod detail_editor;
mod edit_session;
mod endpoints;
mod export;
mod grid;
mod highlight;
mod models;
mod query_coordinator;
mod save_coordinator;

pub use api::{HttpTableApi, TableApi};
pub use client_side::{process_rows, ProcessedPage};
pub use debounce::Debounced;
pub use detail_editor::{
    DetailPhase, DetailRecordEditor, DetailSaveOutcome, DetailSaveTicket, RecordSection,
    CHARACTERISTIC_FIELDS, DEVICE_FIELDS, SPEC_SHEET_FIELDS,
};
pub use edit_session::{
    AutoConfirm, CancelOutcome, ConfirmDiscard, EditPhase, EditSession, EditSessionManager,
    StartEditOutcome,
};
pub use endpoints::{with_query, ApiBase};
pub use export::export_url;
pub use grid::{GridOptions, RowLookup, TableGrid};
pub use highlight::HighlightRegistry;
pub use models::{DeviceDetails, DeviceUpdate, SaveRequest, UpdateResponse};
pub use query_coordinator::{
    ApplyOutcome, FetchTicket, GridView, LoadState, PageSummary, QueryCoordinator,
    DEFAULT_DEBOUNCE,
};
pub use save_coordinator::{
    CommitOutcome, CommitStep, SaveCoordinator, SaveTicket, DEFAULT_REVISION_COLUMN,
};
