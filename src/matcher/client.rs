//! Retrieval client.
//!
//! Wraps the embedding gateway and the vector store behind one object with an
//! explicit lifecycle: `new` -> `init` -> calls -> `shutdown`. Every call is
//! bounded by the configured timeout.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::error::{RetrievalError, RetrievalResult};
use crate::component::{Category, ComponentId, DslComponent};
use crate::embedding::EmbeddingGateway;
use crate::store::{SearchHit, VectorStore};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Text used to probe the gateway during `init`.
const PROBE_TEXT: &str = "probe";

pub struct RetrievalClient {
    gateway: Arc<dyn EmbeddingGateway>,
    store: Arc<dyn VectorStore>,
    timeout: Duration,
    open: AtomicBool,
}

impl RetrievalClient {
    pub fn new(gateway: Arc<dyn EmbeddingGateway>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            gateway,
            store,
            timeout: DEFAULT_TIMEOUT,
            open: AtomicBool::new(false),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the gateway answers with vectors of its declared length, then open.
    pub async fn init(&self) -> RetrievalResult<()> {
        let probe = self
            .bounded(Category::Table, self.gateway.embed(PROBE_TEXT))
            .await?
            .map_err(|source| RetrievalError::Embedding {
                category: Category::Table,
                source,
            })?;

        let expected = self.gateway.dimension();
        if probe.len() != expected {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                actual: probe.len(),
            });
        }

        self.open.store(true, Ordering::SeqCst);
        tracing::debug!(dimension = expected, "matcher.client.open");
        Ok(())
    }

    pub fn shutdown(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            tracing::debug!("matcher.client.closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn embed(&self, text: &str, category: Category) -> RetrievalResult<Vec<f32>> {
        self.ensure_open()?;
        self.bounded(category, self.gateway.embed(text))
            .await?
            .map_err(|source| RetrievalError::Embedding { category, source })
    }

    pub async fn search(
        &self,
        vector: &[f32],
        category: Category,
        k: usize,
    ) -> RetrievalResult<Vec<SearchHit>> {
        self.ensure_open()?;
        self.bounded(category, self.store.search(vector, category, k))
            .await?
            .map_err(|source| RetrievalError::Store { category, source })
    }

    pub async fn fetch(
        &self,
        ids: &[ComponentId],
        category: Category,
    ) -> RetrievalResult<Vec<DslComponent>> {
        self.ensure_open()?;
        self.bounded(category, self.store.fetch(ids))
            .await?
            .map_err(|source| RetrievalError::Store { category, source })
    }

    fn ensure_open(&self) -> RetrievalResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(RetrievalError::ClientClosed)
        }
    }

    async fn bounded<F: Future>(&self, category: Category, fut: F) -> RetrievalResult<F::Output> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RetrievalError::Timeout {
                category,
                millis: self.timeout.as_millis() as u64,
            })
    }
}
