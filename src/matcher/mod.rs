//! Semantic matcher.
//!
//! Retrieves the catalogued components closest to a question, one category
//! at a time. For every (category, phrase) pair the matcher embeds the phrase,
//! asks the store for the `k` nearest vectors of that category, drops hits
//! under the similarity floor and orders what is left by similarity
//! descending, then component id ascending.
//!
//! Retrieval for different pairs runs concurrently; the pairs are joined
//! before anything is handed to the planner.

mod annotator;
mod client;
mod error;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use crate::component::{Category, ComponentId, DslComponent};
use crate::config::MatcherSettings;
use crate::store::{compare_hits, SearchHit};

pub use annotator::{PhraseAnnotator, QueryPhrases, WholeQuestionAnnotator};
pub use client::RetrievalClient;
pub use error::{RetrievalError, RetrievalResult};

/// A retrieved component with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub component: DslComponent,
    /// Cosine similarity in `[0, 1]`.
    pub similarity: f32,
    /// 1-based position within its category.
    pub rank: usize,
}

impl MatchCandidate {
    pub fn id(&self) -> &ComponentId {
        &self.component.id
    }
}

/// Candidates grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandidateSet {
    by_category: BTreeMap<Category, Vec<MatchCandidate>>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from loose candidates, ranking each category.
    pub fn from_candidates(candidates: impl IntoIterator<Item = MatchCandidate>) -> Self {
        let mut set = Self::new();
        for candidate in candidates {
            set.by_category
                .entry(candidate.component.category())
                .or_default()
                .push(candidate);
        }
        for list in set.by_category.values_mut() {
            rank(list);
        }
        set
    }

    /// Replace the candidates of one category.
    pub fn insert(&mut self, category: Category, candidates: Vec<MatchCandidate>) {
        if candidates.is_empty() {
            self.by_category.remove(&category);
        } else {
            self.by_category.insert(category, candidates);
        }
    }

    pub fn get(&self, category: Category) -> &[MatchCandidate] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[MatchCandidate])> {
        self.by_category.iter().map(|(c, v)| (*c, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }
}

/// Sort by similarity descending, then id ascending, and number from 1.
fn rank(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.component.id.cmp(&b.component.id))
    });
    for (i, c) in candidates.iter_mut().enumerate() {
        c.rank = i + 1;
    }
}

/// Top-K retrieval over the component catalogue.
pub struct SemanticMatcher {
    client: Arc<RetrievalClient>,
    settings: MatcherSettings,
}

impl SemanticMatcher {
    pub fn new(client: Arc<RetrievalClient>, settings: MatcherSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &RetrievalClient {
        &self.client
    }

    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    /// Candidates of `category` for `query_text`.
    ///
    /// Returns an empty list, not an error, when nothing clears `min_similarity`.
    pub async fn match_text(
        &self,
        query_text: &str,
        category: Category,
        k: usize,
        min_similarity: f32,
    ) -> RetrievalResult<Vec<MatchCandidate>> {
        if k == 0 || query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = self.client.embed(query_text, category).await?;
        let mut hits: Vec<SearchHit> = self
            .client
            .search(&vector, category, k)
            .await?
            .into_iter()
            .filter(|h| h.similarity >= min_similarity)
            .collect();
        hits.sort_by(compare_hits);
        hits.truncate(k);

        if hits.is_empty() {
            tracing::debug!(%category, min_similarity, "matcher.match.below_floor");
            return Ok(Vec::new());
        }

        let ids: Vec<ComponentId> = hits.iter().map(|h| h.id.clone()).collect();
        let mut components: BTreeMap<ComponentId, DslComponent> = self
            .client
            .fetch(&ids, category)
            .await?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            match components.remove(&hit.id) {
                Some(component) if component.category() == category => {
                    candidates.push(MatchCandidate {
                        component,
                        similarity: hit.similarity,
                        rank: 0,
                    });
                }
                Some(component) => {
                    tracing::warn!(
                        id = %hit.id,
                        expected = %category,
                        found = %component.category(),
                        "matcher.match.category_mismatch"
                    );
                }
                None => {
                    tracing::warn!(id = %hit.id, %category, "matcher.match.missing_component");
                }
            }
        }
        rank(&mut candidates);

        tracing::debug!(%category, count = candidates.len(), "matcher.match.done");
        Ok(candidates)
    }

    /// Retrieve candidates for every annotated phrase concurrently.
    ///
    /// When a category has several phrases, each component keeps its best
    /// similarity and the merged list is cut back to that category's `top_k`.
    pub async fn match_phrases(&self, phrases: &QueryPhrases) -> RetrievalResult<CandidateSet> {
        let requests = phrases.iter().map(|(category, phrase)| {
            let k = self.settings.top_k_for(category);
            let floor = self.settings.min_similarity_for(category);
            async move {
                self.match_text(phrase, category, k, floor)
                    .await
                    .map(|found| (category, found))
            }
        });

        let mut merged: BTreeMap<Category, BTreeMap<ComponentId, MatchCandidate>> =
            BTreeMap::new();
        for result in join_all(requests).await {
            let (category, found) = result?;
            let slot = merged.entry(category).or_default();
            for candidate in found {
                match slot.get(candidate.id()) {
                    Some(existing) if existing.similarity >= candidate.similarity => {}
                    _ => {
                        slot.insert(candidate.id().clone(), candidate);
                    }
                }
            }
        }

        let mut set = CandidateSet::new();
        for (category, by_id) in merged {
            let mut list: Vec<MatchCandidate> = by_id.into_values().collect();
            rank(&mut list);
            list.truncate(self.settings.top_k_for(category));
            set.insert(category, list);
        }
        Ok(set)
    }
}
