//! Gridline Core - Domain types for the server-synchronized data grid
//!
//! This crate provides the types every other Gridline crate depends on.
//! It defines:
//!
//! - `RowSnapshot` - One row of the current page, as returned by the backend
//! - `PrimaryKeySpec` - Backend-declared identity columns of a dataset
//! - `TableQuery` - Pagination, sort, search and filter intent
//! - `DataSource` / `Endpoint` - What the grid is addressing
//! - `FetchResponse` / `TablePage` - The list contract and its normalized form
//! - `RowKey` and [`compute_row_key`] - Stable row identity
//! - `GridError` - Error taxonomy shared by the services layer
//!
//! Nothing in here performs I/O.

mod error;
mod row_key;
mod types;
pub mod value;

pub use error::*;
pub use row_key::*;
pub use types::*;
