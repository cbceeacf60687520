//! Logical plan: the conflict-free query shape the compiler renders.

mod alias;
mod plan;

pub use alias::AliasRegistry;
pub use plan::*;
