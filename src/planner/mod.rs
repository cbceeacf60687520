//! Plan assembly - converts retrieved candidates into one conflict-free plan.
//!
//! Two phases:
//! 1. Join resolution: pick the root table and grow a join tree from it
//! 2. Assembly: bind, deduplicate and reconcile the remaining fragments

pub mod assembler;
pub mod join_builder;
pub mod logical;

pub use assembler::PlanAssembler;
pub use join_builder::{resolve_joins, JoinResolution, ResolvedJoin};
pub use logical::LogicalPlan;

use thiserror::Error;

use crate::component::ComponentId;

/// Candidate sets that cannot be turned into a valid plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanConflictError {
    #[error("no TABLE candidate to use as the root of the query")]
    NoRootTable,

    #[error(
        "join(s) {} cannot be connected to root table `{root}`",
        join_ids(.unresolved)
    )]
    DisconnectedJoin {
        root: String,
        unresolved: Vec<ComponentId>,
    },
}

pub type PlanResult<T> = Result<T, PlanConflictError>;

fn join_ids(ids: &[ComponentId]) -> String {
    ids.iter()
        .map(ComponentId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
