//! End-to-end translation from a question to SQL.
//!
//! ```text
//! Question → Annotate → Match (per category) → Assemble → Compile → SQL + parameters
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nlsql::config::Settings;
//! use nlsql::embedding::HashingEmbedder;
//! use nlsql::pipeline::Pipeline;
//! use nlsql::store::MemoryVectorStore;
//!
//! let settings = Settings::default();
//! let pipeline = Pipeline::from_settings(
//!     &settings,
//!     Arc::new(HashingEmbedder::new(settings.embedding.dimension)),
//!     Arc::new(MemoryVectorStore::new()),
//! );
//! pipeline.init().await?;
//! let translation = pipeline.translate("total sales by region").await?;
//! println!("{}", translation.query.sql);
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::config::Settings;
use crate::embedding::EmbeddingGateway;
use crate::matcher::{
    CandidateSet, PhraseAnnotator, RetrievalClient, RetrievalError, SemanticMatcher,
    WholeQuestionAnnotator,
};
use crate::planner::{LogicalPlan, PlanAssembler, PlanConflictError};
use crate::sql::{CompiledQuery, Dialect, SqlCompiler, UnsafeIdentifierError};
use crate::store::VectorStore;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("cannot assemble a query: {0}")]
    Plan(#[from] PlanConflictError),

    #[error("cannot compile the query: {0}")]
    Compile(#[from] UnsafeIdentifierError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

// ============================================================================
// Result Types
// ============================================================================

/// Everything produced while translating one question.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub question: String,
    /// What retrieval returned, before assembly.
    pub candidates: CandidateSet,
    pub plan: LogicalPlan,
    pub query: CompiledQuery,
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    annotator: Box<dyn PhraseAnnotator>,
    matcher: SemanticMatcher,
    assembler: PlanAssembler,
    compiler: SqlCompiler,
}

impl Pipeline {
    pub fn new(matcher: SemanticMatcher, compiler: SqlCompiler) -> Self {
        Self {
            annotator: Box::new(WholeQuestionAnnotator),
            matcher,
            assembler: PlanAssembler::new(),
            compiler,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        gateway: Arc<dyn EmbeddingGateway>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        let client =
            RetrievalClient::new(gateway, store).with_timeout(settings.retrieval.timeout());
        let matcher = SemanticMatcher::new(Arc::new(client), settings.matcher.clone());
        Self::new(matcher, SqlCompiler::new(settings.compiler.dialect))
    }

    /// Replace the annotator.
    pub fn with_annotator(mut self, annotator: impl PhraseAnnotator + 'static) -> Self {
        self.annotator = Box::new(annotator);
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.compiler = SqlCompiler::new(dialect);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.compiler.dialect()
    }

    /// Open the retrieval client.
    pub async fn init(&self) -> PipelineResult<()> {
        self.matcher.client().init().await?;
        Ok(())
    }

    pub fn shutdown(&self) {
        self.matcher.client().shutdown();
    }

    pub async fn translate(&self, question: &str) -> PipelineResult<Translation> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        let phrases = self.annotator.annotate(question);
        let candidates = self.matcher.match_phrases(&phrases).await?;
        tracing::debug!(candidates = candidates.len(), "pipeline.retrieved");

        let plan = self.assembler.assemble(&candidates)?;
        let query = self.compiler.compile(&plan)?;
        tracing::info!(
            dialect = %query.dialect,
            tables = plan.aliases.len(),
            parameters = query.parameters.len(),
            "pipeline.translated"
        );

        Ok(Translation {
            question: question.to_string(),
            candidates,
            plan,
            query,
        })
    }
}
