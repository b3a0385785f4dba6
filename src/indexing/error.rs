//! Error types for indexing operations

use crate::error::AppError;
use crate::search::SearchError;

/// Result type for indexing operations
pub type IndexingResult<T> = std::result::Result<T, IndexingError>;

#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    /// Job or document rejected before reaching the index
    #[error("Invalid indexing request: {0}")]
    Validation(String),

    #[error(transparent)]
    Index(#[from] SearchError),

    #[error("Indexing cancelled")]
    Cancelled,

    #[error("Indexing timed out after {0}ms")]
    Timeout(u64),

    /// The queue worker has stopped
    #[error("Indexing queue is closed")]
    QueueClosed,
}

impl From<IndexingError> for AppError {
    fn from(err: IndexingError) -> Self {
        match err {
            IndexingError::Validation(msg) => AppError::Validation(msg),
            IndexingError::Index(e) => e.into(),
            IndexingError::Timeout(_) => AppError::Timeout(err.to_string()),
            IndexingError::Cancelled | IndexingError::QueueClosed => {
                AppError::Internal(err.to_string())
            }
        }
    }
}
