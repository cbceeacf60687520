//! Round-trip validation of emitted SQL with sqlparser.

use sqlparser::dialect::{
    DuckDbDialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SnowflakeDialect,
};
use sqlparser::parser::Parser;

use super::compiler::CompiledQuery;
use super::dialect::Dialect;

/// Parse `sql` with the closest sqlparser dialect.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Postgres | Dialect::Redshift => Box::new(PostgreSqlDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
        Dialect::Snowflake => Box::new(SnowflakeDialect {}),
        // No dedicated parser dialect for these
        Dialect::BigQuery | Dialect::Databricks => Box::new(GenericDialect {}),
    };

    let statements = Parser::parse_sql(&*parser_dialect, sql)
        .map_err(|e| format!("Invalid SQL for {}: {}\nSQL: {}", dialect, e, sql))?;
    if statements.len() != 1 {
        return Err(format!(
            "expected one statement for {}, got {}\nSQL: {}",
            dialect,
            statements.len(),
            sql
        ));
    }
    Ok(())
}

/// Validate a compiled query in its own dialect.
pub fn validate_compiled(query: &CompiledQuery) -> Result<(), String> {
    validate_sql(&query.sql, query.dialect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_parameterized_select() {
        validate_sql("SELECT * FROM sales WHERE region = $1", Dialect::Postgres).unwrap();
        validate_sql("SELECT * FROM sales WHERE region = ?", Dialect::MySql).unwrap();
        validate_sql("SELECT * FROM sales WHERE region = @p1", Dialect::TSql).unwrap();
    }

    #[test]
    fn test_rejects_invalid_sql() {
        assert!(validate_sql("SELEC * FORM sales", Dialect::Postgres).is_err());
    }

    #[test]
    fn test_rejects_stacked_statements() {
        assert!(validate_sql("SELECT 1; DROP TABLE sales", Dialect::DuckDb).is_err());
    }
}
