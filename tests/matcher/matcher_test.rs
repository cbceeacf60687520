//! Semantic matcher against a scripted embedding gateway and an in-memory
//! catalogue with hand-picked vectors.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use nlsql::component::{
    Category, ColumnPayload, ColumnRef, ComponentPayload, DslComponent, TablePayload,
};
use nlsql::config::{CategorySettings, MatcherSettings};
use nlsql::embedding::{EmbeddingError, EmbeddingGateway, EmbeddingResult};
use nlsql::matcher::{QueryPhrases, RetrievalClient, RetrievalError, SemanticMatcher};
use nlsql::store::{EmbeddingRecord, MemoryVectorStore, VectorStore};

// ============================================================================
// Fixtures
// ============================================================================

/// Returns fixed vectors for known texts and fails on anything else.
struct ScriptedGateway {
    dimension: usize,
    vectors: HashMap<&'static str, Vec<f32>>,
}

impl ScriptedGateway {
    fn new() -> Self {
        let vectors = HashMap::from([
            ("probe", vec![0.0, 0.0, 1.0]),
            ("sales", vec![1.0, 0.0, 0.0]),
            ("orders", vec![0.0, 1.0, 0.0]),
            ("sales or orders", vec![1.0, 1.0, 0.0]),
            ("nothing alike", vec![-1.0, -1.0, 0.0]),
        ]);
        Self {
            dimension: 3,
            vectors,
        }
    }
}

#[async_trait]
impl EmbeddingGateway for ScriptedGateway {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EmbeddingError::Backend(format!("no vector for `{}`", text)))
    }
}

fn table(id: &str, name: &str) -> DslComponent {
    DslComponent::new(
        id,
        format!("{} table", name),
        ComponentPayload::Table(TablePayload {
            table: name.into(),
            alias: None,
        }),
    )
}

async fn put(store: &MemoryVectorStore, component: DslComponent, vector: Vec<f32>) {
    let record = EmbeddingRecord {
        id: component.id.clone(),
        category: component.category(),
        vector,
        text: component.description.clone(),
    };
    store.upsert(record, component).await.unwrap();
}

async fn catalogue() -> Arc<MemoryVectorStore> {
    let store = MemoryVectorStore::new();
    put(&store, table("t-sales", "sales"), vec![1.0, 0.0, 0.0]).await;
    put(&store, table("t-orders", "orders"), vec![0.0, 1.0, 0.0]).await;
    put(&store, table("t-invoices", "invoices"), vec![0.0, 1.0, 0.0]).await;
    put(&store, table("t-weather", "weather"), vec![0.0, 0.0, 1.0]).await;
    put(
        &store,
        DslComponent::new(
            "c-region",
            "sales region",
            ComponentPayload::Column(ColumnPayload {
                column: ColumnRef::new("sales", "region"),
                alias: None,
            }),
        ),
        vec![1.0, 0.0, 0.0],
    )
    .await;
    Arc::new(store)
}

async fn matcher(settings: MatcherSettings) -> SemanticMatcher {
    let client = RetrievalClient::new(Arc::new(ScriptedGateway::new()), catalogue().await);
    client.init().await.unwrap();
    SemanticMatcher::new(Arc::new(client), settings)
}

fn ids(candidates: &[nlsql::matcher::MatchCandidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.id().as_str()).collect()
}

// ============================================================================
// match_text
// ============================================================================

#[tokio::test]
async fn test_equal_similarity_ranks_by_smallest_id() {
    let m = matcher(MatcherSettings::default()).await;
    let found = m
        .match_text("sales or orders", Category::Table, 5, 0.5)
        .await
        .unwrap();

    assert_eq!(ids(&found), vec!["t-invoices", "t-orders", "t-sales"]);
    let ranks: Vec<usize> = found.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_top_k_cuts_after_tie_break() {
    let m = matcher(MatcherSettings::default()).await;
    let found = m
        .match_text("sales or orders", Category::Table, 2, 0.5)
        .await
        .unwrap();
    assert_eq!(ids(&found), vec!["t-invoices", "t-orders"]);
}

#[tokio::test]
async fn test_similarity_floor_filters_candidates() {
    let m = matcher(MatcherSettings::default()).await;
    let found = m.match_text("sales", Category::Table, 5, 0.5).await.unwrap();

    assert_eq!(ids(&found), vec!["t-sales"]);
    assert!((found[0].similarity - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_search_is_scoped_to_category() {
    let m = matcher(MatcherSettings::default()).await;
    let found = m.match_text("sales", Category::Column, 5, 0.5).await.unwrap();

    assert_eq!(ids(&found), vec!["c-region"]);
    assert_eq!(found[0].component.category(), Category::Column);
}

#[tokio::test]
async fn test_nothing_above_floor_is_empty_not_error() {
    let m = matcher(MatcherSettings::default()).await;
    let found = m
        .match_text("nothing alike", Category::Table, 5, 0.3)
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn test_blank_text_and_zero_k_short_circuit() {
    let m = matcher(MatcherSettings::default()).await;
    assert!(m.match_text("   ", Category::Table, 5, 0.0).await.unwrap().is_empty());
    assert!(m.match_text("sales", Category::Table, 0, 0.0).await.unwrap().is_empty());
}

// ============================================================================
// match_phrases
// ============================================================================

#[tokio::test]
async fn test_phrases_merge_keeps_best_similarity() {
    let m = matcher(MatcherSettings {
        min_similarity: 0.5,
        ..MatcherSettings::default()
    })
    .await;
    let phrases = QueryPhrases::new()
        .with(Category::Table, "sales or orders")
        .with(Category::Table, "sales");

    let set = m.match_phrases(&phrases).await.unwrap();
    let tables = set.get(Category::Table);

    assert_eq!(ids(tables), vec!["t-sales", "t-invoices", "t-orders"]);
    assert!((tables[0].similarity - 1.0).abs() < 1e-6);
    assert!(tables[1].similarity < 0.8);
    assert!(set.get(Category::Column).is_empty());
}

#[tokio::test]
async fn test_phrases_respect_category_top_k() {
    let settings = MatcherSettings {
        top_k: 5,
        min_similarity: 0.5,
        categories: BTreeMap::from([(
            Category::Table,
            CategorySettings {
                top_k: Some(2),
                min_similarity: None,
            },
        )]),
    };
    let m = matcher(settings).await;
    let phrases = QueryPhrases::new()
        .with(Category::Table, "sales")
        .with(Category::Table, "orders")
        .with(Category::Column, "sales");

    let set = m.match_phrases(&phrases).await.unwrap();

    assert_eq!(ids(set.get(Category::Table)), vec!["t-invoices", "t-orders"]);
    assert_eq!(ids(set.get(Category::Column)), vec!["c-region"]);
}

#[tokio::test]
async fn test_one_failed_phrase_fails_the_request() {
    let m = matcher(MatcherSettings::default()).await;
    let phrases = QueryPhrases::new()
        .with(Category::Table, "sales")
        .with(Category::Filter, "no such phrase");

    let err = m.match_phrases(&phrases).await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Embedding {
            category: Category::Filter,
            ..
        }
    ));
}

// ============================================================================
// Client lifecycle
// ============================================================================

#[tokio::test]
async fn test_calls_before_init_are_rejected() {
    let client = RetrievalClient::new(Arc::new(ScriptedGateway::new()), catalogue().await);
    let m = SemanticMatcher::new(Arc::new(client), MatcherSettings::default());

    let err = m.match_text("sales", Category::Table, 5, 0.0).await.unwrap_err();
    assert!(matches!(err, RetrievalError::ClientClosed));
}

#[tokio::test]
async fn test_calls_after_shutdown_are_rejected() {
    let m = matcher(MatcherSettings::default()).await;
    m.client().shutdown();
    assert!(!m.client().is_open());

    let err = m.match_text("sales", Category::Table, 5, 0.0).await.unwrap_err();
    assert!(matches!(err, RetrievalError::ClientClosed));
}

#[tokio::test]
async fn test_init_rejects_gateway_with_wrong_dimension() {
    let mut gateway = ScriptedGateway::new();
    gateway.dimension = 4;
    let client = RetrievalClient::new(Arc::new(gateway), catalogue().await);

    let err = client.init().await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::DimensionMismatch {
            expected: 4,
            actual: 3
        }
    ));
    assert!(!client.is_open());
}
