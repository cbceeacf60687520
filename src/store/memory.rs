//! In-memory vector store backed by a concurrent map.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{
    cosine_similarity, top_k, EmbeddingRecord, SearchHit, StoreError, StoreResult, VectorStore,
};
use crate::component::{Category, ComponentId, DslComponent};

/// Brute-force cosine search over a [`DashMap`].
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    entries: DashMap<ComponentId, (EmbeddingRecord, DslComponent)>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn stored_dimension(&self) -> Option<usize> {
        self.entries
            .iter()
            .next()
            .map(|entry| entry.value().0.vector.len())
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, record: EmbeddingRecord, component: DslComponent) -> StoreResult<()> {
        record.check_matches(&component)?;
        if let Some(expected) = self.stored_dimension() {
            if expected != record.vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: record.vector.len(),
                });
            }
        }
        self.entries.insert(record.id.clone(), (record, component));
        Ok(())
    }

    async fn delete(&self, id: &ComponentId) -> StoreResult<bool> {
        Ok(self.entries.remove(id).is_some())
    }

    async fn search(
        &self,
        vector: &[f32],
        category: Category,
        k: usize,
    ) -> StoreResult<Vec<SearchHit>> {
        let hits = self
            .entries
            .iter()
            .filter(|entry| entry.value().0.category == category)
            .map(|entry| SearchHit {
                id: entry.key().clone(),
                similarity: cosine_similarity(vector, &entry.value().0.vector),
            })
            .collect();
        Ok(top_k(hits, k))
    }

    async fn fetch(&self, ids: &[ComponentId]) -> StoreResult<Vec<DslComponent>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| entry.value().1.clone()))
            .collect())
    }

    async fn list(&self, category: Option<Category>) -> StoreResult<Vec<DslComponent>> {
        let mut components: Vec<DslComponent> = self
            .entries
            .iter()
            .map(|entry| entry.value().1.clone())
            .filter(|c| category.map_or(true, |cat| c.category() == cat))
            .collect();
        components.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(components)
    }
}
