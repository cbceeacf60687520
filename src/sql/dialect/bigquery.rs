//! BigQuery SQL dialect.
//!
//! Backtick identifier quoting and positional `?` query parameters. LIKE has
//! no `ESCAPE` clause; wildcards are escaped with a backslash.

use super::helpers;
use super::SqlDialect;

/// BigQuery SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct BigQuery;

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn like_escape_char(&self) -> char {
        '\\'
    }

    fn like_escape_clause(&self) -> bool {
        false
    }
}
