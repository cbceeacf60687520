//! Amazon Redshift SQL dialect.
//!
//! Redshift speaks the PostgreSQL wire protocol, so quoting and parameter
//! style follow Postgres.

use super::helpers;
use super::SqlDialect;

/// Redshift SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Redshift;

impl SqlDialect for Redshift {
    fn name(&self) -> &'static str {
        "redshift"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn placeholder(&self, index: usize) -> String {
        helpers::placeholder_dollar(index)
    }
}
