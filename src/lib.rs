//! # nlsql
//!
//! Natural-language questions to parameterized SQL through semantic
//! retrieval of typed query fragments.
//!
//! ## Architecture
//!
//! Questions are never parsed into SQL directly. Instead a catalogue of small,
//! typed fragments ("components") is built ahead of time, each with a
//! natural-language description. A question retrieves the closest fragments
//! per category and a deterministic assembler turns them into one query:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Component Catalogue                         │
//! │  (TABLE, COLUMN, JOIN, FILTER, AGGREGATE, GROUP_BY, ...) │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [registry: validate + embed]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Vector Store                            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [matcher: top-K per category]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  CandidateSet                            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner: root, joins, dedup, grouping]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  LogicalPlan                             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [sql compiler]
//! ┌─────────────────────────────────────────────────────────┐
//! │          SQL text + bound parameters                     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod component;
pub mod config;
pub mod embedding;
pub mod matcher;
pub mod pipeline;
pub mod planner;
pub mod sql;
pub mod store;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::component::{
        Category, ColumnRef, ComponentId, ComponentPayload, ComponentRegistry, DslComponent,
        Value,
    };
    pub use crate::config::Settings;
    pub use crate::embedding::{EmbeddingGateway, HashingEmbedder};
    pub use crate::matcher::{
        CandidateSet, MatchCandidate, PhraseAnnotator, QueryPhrases, RetrievalClient,
        SemanticMatcher, WholeQuestionAnnotator,
    };
    pub use crate::pipeline::{Pipeline, PipelineError, Translation};
    pub use crate::planner::{LogicalPlan, PlanAssembler, PlanConflictError};
    pub use crate::sql::{CompiledQuery, Dialect, SqlCompiler};
    pub use crate::store::{MemoryVectorStore, SqliteVectorStore, VectorStore};
}

pub use pipeline::{Pipeline, Translation};
pub use sql::Dialect;
