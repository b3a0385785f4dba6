//! Error types for search operations

use crate::error::AppError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Request failed validation and never reached the index
    #[error("Invalid search request: {0}")]
    Validation(String),

    /// Index could not be reached
    #[error("Index transport failed: {0}")]
    Transport(String),

    /// Index call exceeded its deadline
    #[error("Index request timed out after {0}ms")]
    Timeout(u64),

    /// Index answered with a non-success status
    #[error("Index rejected request ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// Index response could not be decoded
    #[error("Malformed index response: {0}")]
    MalformedResponse(String),

    /// Document not found
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl SearchError {
    /// Whether the failure came from talking to the index, as opposed to the request itself
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SearchError::Transport(_)
                | SearchError::Timeout(_)
                | SearchError::Rejected { .. }
                | SearchError::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SearchError::MalformedResponse(err.to_string())
        } else {
            SearchError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::MalformedResponse(err.to_string())
    }
}

impl From<validator::ValidationErrors> for SearchError {
    fn from(err: validator::ValidationErrors) -> Self {
        SearchError::Validation(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Validation(msg) => AppError::Validation(msg),
            SearchError::NotFound(msg) => AppError::NotFound(msg),
            SearchError::InvalidConfiguration(msg) => AppError::Configuration(msg),
            SearchError::Timeout(_) => AppError::Timeout(err.to_string()),
            _ => AppError::Index(err.to_string()),
        }
    }
}
