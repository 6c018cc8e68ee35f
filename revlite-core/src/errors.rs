use crate::revision::RevId;
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(Uuid),

    #[error("Revision conflict on document {document_id}: parent {expected} is not current")]
    Conflict { document_id: Uuid, expected: RevId },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid attachment '{name}': {reason}")]
    InvalidAttachment { name: String, reason: String },

    #[error("Invalid revision id: {0}")]
    InvalidRevId(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Wrap an underlying persistence failure. These are retryable by callers.
    pub fn unavailable(err: impl ToString) -> Self {
        StoreError::Unavailable(err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<uuid::Error> for StoreError {
    fn from(err: uuid::Error) -> Self {
        StoreError::Unavailable(format!("invalid uuid in stored row: {err}"))
    }
}

impl From<chrono::ParseError> for StoreError {
    fn from(err: chrono::ParseError) -> Self {
        StoreError::Unavailable(format!("invalid timestamp in stored row: {err}"))
    }
}
