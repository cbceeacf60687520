//! Vector store: the persisted catalogue of component embeddings.
//!
//! The store owns every [`EmbeddingRecord`] together with the component it
//! was computed from. Records are written once at registration and only go
//! away through an explicit delete.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryVectorStore`] - concurrent map, for tests and embedding the
//!   pipeline in a long-running service that loads its catalogue at start.
//! - [`SqliteVectorStore`] - single-file persistence used by the CLI.

mod memory;
mod sqlite;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::{Category, ComponentId, DslComponent};

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to determine data directory")]
    NoDataDir,

    /// A vector does not match the dimension of the vectors already stored.
    #[error("vector dimension mismatch: store holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The record and the component disagree on identity or category.
    #[error("record for `{id}` does not match its component")]
    RecordMismatch { id: ComponentId },

    #[error("store lock poisoned")]
    Poisoned,
}

/// The embedding of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: ComponentId,
    pub category: Category,
    pub vector: Vec<f32>,
    /// The text the vector was computed from.
    pub text: String,
}

impl EmbeddingRecord {
    fn check_matches(&self, component: &DslComponent) -> StoreResult<()> {
        if self.id != component.id || self.category != component.category() {
            return Err(StoreError::RecordMismatch {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// One nearest-neighbour result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: ComponentId,
    pub similarity: f32,
}

/// Nearest-neighbour search over component embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the record for `component`.
    async fn upsert(&self, record: EmbeddingRecord, component: DslComponent) -> StoreResult<()>;

    /// Remove a record. Returns whether anything was removed.
    async fn delete(&self, id: &ComponentId) -> StoreResult<bool>;

    /// The `k` records of `category` most similar to `vector`, best first.
    async fn search(
        &self,
        vector: &[f32],
        category: Category,
        k: usize,
    ) -> StoreResult<Vec<SearchHit>>;

    /// Components for `ids`. Unknown ids are skipped.
    async fn fetch(&self, ids: &[ComponentId]) -> StoreResult<Vec<DslComponent>>;

    /// All components, optionally restricted to one category, ordered by id.
    async fn list(&self, category: Option<Category>) -> StoreResult<Vec<DslComponent>>;
}

/// Cosine similarity clamped to `[0, 1]`.
///
/// Mismatched lengths and zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0f32;
    let mut norm_a = 0f32;
    let mut norm_b = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

/// Similarity descending, then id ascending.
pub fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort scored hits deterministically and keep the best `k`.
pub(crate) fn top_k(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(compare_hits);
    hits.truncate(k);
    hits
}
