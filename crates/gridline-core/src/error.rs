//! Error types for Gridline

use thiserror::Error;

/// Core error type for grid operations
#[derive(Error, Debug)]
pub enum GridError {
    /// Network failure before any HTTP status was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status with no more specific meaning
    #[error("Request failed ({status}): {detail}")]
    Http { status: u16, detail: String },

    /// Server rejected a save (400/404/422)
    #[error("{0}")]
    Validation(String),

    /// Server reported a concurrent modification (409)
    #[error("{0}")]
    Conflict(String),

    #[error("This dataset does not expose a primary key and cannot be edited")]
    NotAddressable,

    #[error("Column '{0}' is read-only")]
    ReadOnlyColumn(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Row {0} is out of range")]
    RowOutOfRange(usize),

    #[error("No edit is in progress")]
    NoActiveEdit,

    #[error("A save is already in progress")]
    SaveInProgress,

    /// The user chose to keep unsaved changes
    #[error("Unsaved changes were kept")]
    DiscardDeclined,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl GridError {
    /// Text shown to the user for this error.
    ///
    /// Server-reported details are shown verbatim; transport failures get a
    /// generic prefix so they read differently from validation messages.
    pub fn user_message(&self) -> String {
        match self {
            GridError::Http { detail, .. } => detail.clone(),
            GridError::Validation(detail) | GridError::Conflict(detail) => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the server rejected the request (as opposed to never answering).
    pub fn is_server_reported(&self) -> bool {
        matches!(
            self,
            GridError::Http { .. } | GridError::Validation(_) | GridError::Conflict(_)
        )
    }

    /// Classify a non-success status for a save request.
    pub fn from_save_status(status: u16, detail: Option<String>) -> Self {
        let detail = detail.unwrap_or_else(|| format!("Save failed with status {}", status));
        match status {
            409 => GridError::Conflict(detail),
            400 | 404 | 422 => GridError::Validation(detail),
            _ => GridError::Http { status, detail },
        }
    }
}

/// Result type alias for grid operations
pub type Result<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_status_classification() {
        assert!(matches!(
            GridError::from_save_status(409, Some("lock mismatch".into())),
            GridError::Conflict(d) if d == "lock mismatch"
        ));
        assert!(matches!(
            GridError::from_save_status(422, None),
            GridError::Validation(_)
        ));
        assert!(matches!(
            GridError::from_save_status(500, Some("boom".into())),
            GridError::Http { status: 500, .. }
        ));
    }

    #[test]
    fn user_message_prefers_server_detail() {
        let err = GridError::Http {
            status: 500,
            detail: "database is locked".into(),
        };
        assert_eq!(err.user_message(), "database is locked");
        assert!(err.is_server_reported());

        let err = GridError::Transport("connection refused".into());
        assert_eq!(err.user_message(), "Transport error: connection refused");
        assert!(!err.is_server_reported());
    }
}
