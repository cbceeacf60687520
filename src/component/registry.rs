//! Component registration.
//!
//! Registration validates a component against the TABLE components already
//! in the catalogue, embeds its description and writes the record to the
//! vector store. Records are immutable: re-registering an identical
//! definition is a no-op and a different definition under a taken id is
//! rejected.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use super::{validate, Category, ComponentId, ComponentPayload, DslComponent, ValidationError};
use crate::embedding::{EmbeddingError, EmbeddingGateway};
use crate::store::{EmbeddingRecord, StoreError, VectorStore};

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to embed component: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new record was written.
    Registered,
    /// An identical definition was already registered.
    Unchanged,
}

/// Counts from a bulk registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSummary {
    pub registered: usize,
    pub unchanged: usize,
}

pub struct ComponentRegistry {
    gateway: Arc<dyn EmbeddingGateway>,
    store: Arc<dyn VectorStore>,
}

impl ComponentRegistry {
    pub fn new(gateway: Arc<dyn EmbeddingGateway>, store: Arc<dyn VectorStore>) -> Self {
        Self { gateway, store }
    }

    /// Logical names of every registered TABLE component.
    pub async fn known_tables(&self) -> RegistryResult<BTreeSet<String>> {
        let tables = self.store.list(Some(Category::Table)).await?;
        Ok(tables
            .into_iter()
            .filter_map(|c| match c.payload {
                ComponentPayload::Table(t) => Some(t.table),
                _ => None,
            })
            .collect())
    }

    pub async fn register(&self, component: DslComponent) -> RegistryResult<RegisterOutcome> {
        let known = self.known_tables().await?;
        self.register_with(component, &known).await
    }

    /// Register many components. TABLE components go first so the rest can
    /// reference them. Stops at the first failure.
    pub async fn register_all(
        &self,
        components: Vec<DslComponent>,
    ) -> RegistryResult<RegisterSummary> {
        let (tables, rest): (Vec<_>, Vec<_>) = components
            .into_iter()
            .partition(|c| c.category() == Category::Table);

        let mut known = self.known_tables().await?;
        let mut summary = RegisterSummary::default();

        for component in tables.into_iter().chain(rest) {
            let table = match &component.payload {
                ComponentPayload::Table(t) => Some(t.table.clone()),
                _ => None,
            };
            match self.register_with(component, &known).await? {
                RegisterOutcome::Registered => summary.registered += 1,
                RegisterOutcome::Unchanged => summary.unchanged += 1,
            }
            if let Some(table) = table {
                known.insert(table);
            }
        }

        tracing::info!(
            registered = summary.registered,
            unchanged = summary.unchanged,
            "registry.bulk.done"
        );
        Ok(summary)
    }

    /// Remove a component's record. Returns whether it existed.
    pub async fn deregister(&self, id: &ComponentId) -> RegistryResult<bool> {
        let removed = self.store.delete(id).await?;
        tracing::info!(id = %id, removed, "registry.deregister");
        Ok(removed)
    }

    async fn register_with(
        &self,
        component: DslComponent,
        known_tables: &BTreeSet<String>,
    ) -> RegistryResult<RegisterOutcome> {
        validate(&component, known_tables)?;

        let existing = self.store.fetch(std::slice::from_ref(&component.id)).await?;
        if let Some(current) = existing.into_iter().next() {
            if current == component {
                tracing::debug!(id = %component.id, "registry.register.unchanged");
                return Ok(RegisterOutcome::Unchanged);
            }
            return Err(ValidationError::Immutable { id: component.id }.into());
        }

        let text = component.embedding_text().to_string();
        let vector = self.gateway.embed(&text).await?;
        let record = EmbeddingRecord {
            id: component.id.clone(),
            category: component.category(),
            vector,
            text,
        };

        tracing::info!(
            id = %component.id,
            category = %component.category(),
            "registry.register"
        );
        self.store.upsert(record, component).await?;
        Ok(RegisterOutcome::Registered)
    }
}
