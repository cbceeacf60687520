//! Embedding gateway: text in, fixed-length vector out.
//!
//! Production deployments wrap a hosted model behind [`EmbeddingGateway`].
//! [`HashingEmbedder`] is a deterministic offline implementation used by the
//! CLI and the test suite.

mod hashing;

use async_trait::async_trait;
use thiserror::Error;

pub use hashing::HashingEmbedder;

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Errors raised by an embedding backend.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Nothing to embed.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// The backend returned a vector of the wrong length.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The backend itself failed (network, quota, model error).
    #[error("embedding backend failed: {0}")]
    Backend(String),
}

/// Maps text to a vector of [`EmbeddingGateway::dimension`] floats.
///
/// Implementations must be deterministic for a given model version: the same
/// text always yields the same vector.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Length of every vector this gateway produces.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;
}
