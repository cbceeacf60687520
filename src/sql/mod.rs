//! SQL generation module.
//!
//! This module renders logical plans as parameterized, multi-dialect SQL.
//! It includes:
//!
//! - [`compiler`] - LogicalPlan to SQL text plus bound parameters
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod compiler;
pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use compiler::{CompiledQuery, SqlCompiler, UnsafeIdentifierError};
pub use dialect::{Dialect, SqlDialect, UnknownDialect};
pub use expr::{col, func, param, star, table_col, BinaryOperator, Expr, ExprExt};
pub use query::{Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};
