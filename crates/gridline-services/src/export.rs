//! Export Trigger
//!
//! Builds the spreadsheet download URL for the current view. The download
//! itself belongs to the host.

use gridline_core::{DataSource, Result, TableQuery};
use url::Url;

use crate::endpoints::{with_query, ApiBase};

/// Export URL for `source` under `query`, without pagination.
///
/// Static sources have nothing to export and yield `None`.
pub fn export_url(base: &ApiBase, source: &DataSource, query: &TableQuery) -> Result<Option<Url>> {
    let Some(endpoint) = source.endpoint() else {
        return Ok(None);
    };
    let url = with_query(base.export_url(endpoint)?, &query.export_params());
    tracing::debug!(url = %url, "Built export URL");
    Ok(Some(url))
}
