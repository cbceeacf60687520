//! Retrieval errors.

use thiserror::Error;

use crate::component::Category;
use crate::embedding::EmbeddingError;
use crate::store::StoreError;

/// Result type for retrieval operations.
pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// A failed embedding or store call. Any one of these fails the whole request.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding failed for {category}: {source}")]
    Embedding {
        category: Category,
        #[source]
        source: EmbeddingError,
    },

    #[error("vector store failed for {category}: {source}")]
    Store {
        category: Category,
        #[source]
        source: StoreError,
    },

    #[error("retrieval for {category} timed out after {millis}ms")]
    Timeout { category: Category, millis: u64 },

    /// The gateway reports a different vector length than the catalogue uses.
    #[error("embedding gateway dimension {actual} does not match expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("retrieval client is not open")]
    ClientClosed,
}
