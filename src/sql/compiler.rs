//! Logical plan to SQL.
//!
//! The compiler lowers a [`LogicalPlan`] onto the [`Query`] builder and
//! serializes it for one dialect. Clause order is fixed by the builder:
//! SELECT, FROM, JOIN, WHERE, GROUP BY, ORDER BY, then pagination.
//!
//! Filter values never appear in the SQL text. Each one becomes a
//! placeholder, numbered left to right, and is returned in
//! [`CompiledQuery::parameters`] in the same order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::dialect::{Dialect, SqlDialect};
use super::expr::{col, func, param, table_col, Expr, ExprExt};
use super::query::{JoinType, OrderByExpr, Query, SelectExpr, TableRef};
use crate::component::{FilterOperator, JoinKind, SortDirection, Value};
use crate::planner::logical::{FilterPredicate, LogicalPlan, OrderTarget, PlanColumn};

static SAFE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern is valid")
});

/// An identifier outside the `[A-Za-z0-9_]` allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsafe {context} identifier `{identifier}`: only ASCII letters, digits and underscores are allowed")]
pub struct UnsafeIdentifierError {
    pub identifier: String,
    /// Which part of the plan the identifier came from.
    pub context: &'static str,
}

/// Whether `ident` may be emitted.
pub fn is_safe_identifier(ident: &str) -> bool {
    SAFE_IDENTIFIER.is_match(ident)
}

/// Parameterized SQL ready for an execution layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    /// Bound values, in placeholder order.
    pub parameters: Vec<Value>,
    pub dialect: Dialect,
}

/// Renders logical plans for one dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCompiler {
    dialect: Dialect,
}

impl SqlCompiler {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn compile(&self, plan: &LogicalPlan) -> Result<CompiledQuery, UnsafeIdentifierError> {
        let (query, parameters) = lower(plan, self.dialect)?;
        let sql = query.to_sql(self.dialect);
        tracing::debug!(
            dialect = %self.dialect,
            parameters = parameters.len(),
            "sql.compile.done"
        );
        Ok(CompiledQuery {
            sql,
            parameters,
            dialect: self.dialect,
        })
    }
}

/// Lower a plan onto the query builder, collecting bound values.
///
/// The dialect only decides how CONTAINS patterns are escaped; the query
/// itself is rendered later.
pub fn lower(
    plan: &LogicalPlan,
    dialect: Dialect,
) -> Result<(Query, Vec<Value>), UnsafeIdentifierError> {
    check_identifiers(plan)?;

    let mut select: Vec<SelectExpr> = Vec::new();

    // Group keys first, carrying a projection's alias when one matches
    for key in &plan.group_by {
        let alias = plan
            .projections
            .iter()
            .find(|p| p.column.same_column(key))
            .and_then(|p| p.alias.as_deref());
        select.push(select_column(key, alias));
    }
    for p in &plan.projections {
        if !plan.group_by.iter().any(|g| g.same_column(&p.column)) {
            select.push(select_column(&p.column, p.alias.as_deref()));
        }
    }
    for agg in &plan.aggregates {
        select.push(func(agg.function.sql_name(), vec![column_expr(&agg.column)]).alias(&agg.alias));
    }

    let mut query = if select.is_empty() {
        Query::new().select_star()
    } else {
        Query::new().select(select)
    };

    query = query.from(TableRef::new(&plan.root.table).with_alias(&plan.root.alias));

    for edge in &plan.joins {
        let on = column_expr(&edge.from).eq(column_expr(&edge.to));
        query = query.join(
            join_type(edge.kind),
            TableRef::new(&edge.to.table).with_alias(&edge.to.table_alias),
            on,
        );
    }

    let mut parameters = Vec::new();
    for filter in &plan.filters {
        query = query.filter(predicate(filter, &mut parameters, dialect));
    }

    if !plan.group_by.is_empty() {
        query = query.group_by(plan.group_by.iter().map(column_expr).collect());
    }

    if !plan.order_by.is_empty() {
        let keys = plan
            .order_by
            .iter()
            .map(|key| {
                let expr = match &key.target {
                    OrderTarget::Column(c) => column_expr(c),
                    OrderTarget::Aggregate { alias } => col(alias),
                };
                match key.direction {
                    SortDirection::Asc => OrderByExpr::asc(expr),
                    SortDirection::Desc => OrderByExpr::desc(expr),
                }
            })
            .collect();
        query = query.order_by(keys);
    }

    if let Some(limit) = &plan.limit {
        query = query.limit(limit.limit);
        if let Some(offset) = limit.offset {
            query = query.offset(offset);
        }
    }

    Ok((query, parameters))
}

fn column_expr(c: &PlanColumn) -> Expr {
    table_col(&c.table_alias, &c.column)
}

fn select_column(c: &PlanColumn, alias: Option<&str>) -> SelectExpr {
    match alias {
        Some(a) => column_expr(c).alias(a),
        None => SelectExpr::new(column_expr(c)),
    }
}

fn join_type(kind: JoinKind) -> JoinType {
    match kind {
        JoinKind::Inner => JoinType::Inner,
        JoinKind::Left => JoinType::Left,
        JoinKind::Right => JoinType::Right,
        JoinKind::Full => JoinType::Full,
    }
}

fn bind(parameters: &mut Vec<Value>, value: Value) -> Expr {
    parameters.push(value);
    param(parameters.len())
}

fn predicate(filter: &FilterPredicate, parameters: &mut Vec<Value>, dialect: Dialect) -> Expr {
    let column = column_expr(&filter.column);
    // Arity is enforced at registration
    let value = |i: usize| {
        filter
            .values
            .get(i)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    };

    match filter.operator {
        FilterOperator::Equals => column.eq(bind(parameters, value(0))),
        FilterOperator::NotEquals => column.ne(bind(parameters, value(0))),
        FilterOperator::GreaterThan => column.gt(bind(parameters, value(0))),
        FilterOperator::LessThan => column.lt(bind(parameters, value(0))),
        FilterOperator::Gte => column.gte(bind(parameters, value(0))),
        FilterOperator::Lte => column.lte(bind(parameters, value(0))),
        FilterOperator::Between => {
            let low = bind(parameters, value(0));
            let high = bind(parameters, value(1));
            column.between(low, high)
        }
        FilterOperator::In => {
            let list = filter
                .values
                .iter()
                .map(|v| bind(parameters, v.clone()))
                .collect();
            column.in_list(list)
        }
        FilterOperator::Contains => {
            let escape = dialect.like_escape_char();
            let pattern = format!("%{}%", escape_like(&value(0).to_string(), escape));
            let pattern = bind(parameters, Value::String(pattern));
            if dialect.like_escape_clause() {
                column.like_escape(pattern, escape)
            } else {
                column.like(pattern)
            }
        }
    }
}

/// Escape LIKE wildcards so the value matches literally.
pub fn escape_like(s: &str, escape: char) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == escape || ch == '%' || ch == '_' {
            out.push(escape);
        }
        out.push(ch);
    }
    out
}

fn check(ident: &str, context: &'static str) -> Result<(), UnsafeIdentifierError> {
    if is_safe_identifier(ident) {
        Ok(())
    } else {
        Err(UnsafeIdentifierError {
            identifier: ident.to_string(),
            context,
        })
    }
}

fn check_column(c: &PlanColumn) -> Result<(), UnsafeIdentifierError> {
    check(&c.table, "table")?;
    check(&c.table_alias, "table alias")?;
    check(&c.column, "column")
}

fn check_identifiers(plan: &LogicalPlan) -> Result<(), UnsafeIdentifierError> {
    for binding in plan.aliases.iter() {
        check(&binding.table, "table")?;
        check(&binding.alias, "table alias")?;
    }
    check(&plan.root.table, "table")?;
    check(&plan.root.alias, "table alias")?;
    for edge in &plan.joins {
        check_column(&edge.from)?;
        check_column(&edge.to)?;
    }
    for f in &plan.filters {
        check_column(&f.column)?;
    }
    for p in &plan.projections {
        check_column(&p.column)?;
        if let Some(alias) = &p.alias {
            check(alias, "column alias")?;
        }
    }
    for a in &plan.aggregates {
        check_column(&a.column)?;
        check(&a.alias, "aggregate alias")?;
    }
    for g in &plan.group_by {
        check_column(g)?;
    }
    for o in &plan.order_by {
        match &o.target {
            OrderTarget::Column(c) => check_column(c)?,
            OrderTarget::Aggregate { alias } => check(alias, "aggregate alias")?,
        }
    }
    Ok(())
}
