//! End-to-end compilation: assembled plans rendered in every dialect and
//! re-parsed with sqlparser.

use nlsql::component::{
    AggregateFunction, AggregatePayload, ColumnPayload, ColumnRef, ComponentPayload, DslComponent,
    FilterOperator, FilterPayload, GroupByPayload, JoinKind, JoinPayload, LimitPayload,
    OrderByPayload, SortDirection, TablePayload, Value,
};
use nlsql::matcher::{CandidateSet, MatchCandidate};
use nlsql::planner::PlanAssembler;
use nlsql::sql::{CompiledQuery, Dialect, SqlCompiler};
use sqlparser::dialect::{
    DuckDbDialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SnowflakeDialect,
};
use sqlparser::parser::Parser;

// ============================================================================
// Helpers
// ============================================================================

fn parse(query: &CompiledQuery) {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match query.dialect {
        Dialect::Postgres | Dialect::Redshift => Box::new(PostgreSqlDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::TSql => Box::new(MsSqlDialect {}),
        Dialect::Snowflake => Box::new(SnowflakeDialect {}),
        Dialect::BigQuery | Dialect::Databricks => Box::new(GenericDialect {}),
    };
    let statements = Parser::parse_sql(&*parser_dialect, &query.sql)
        .unwrap_or_else(|e| panic!("{} rejected: {}\n{}", query.dialect, e, query.sql));
    assert_eq!(statements.len(), 1, "{}", query.sql);
}

fn candidate(id: &str, similarity: f32, payload: ComponentPayload) -> MatchCandidate {
    MatchCandidate {
        component: DslComponent::new(id, format!("component {}", id), payload),
        similarity,
        rank: 0,
    }
}

fn table(id: &str, name: &str) -> MatchCandidate {
    candidate(
        id,
        0.9,
        ComponentPayload::Table(TablePayload {
            table: name.into(),
            alias: None,
        }),
    )
}

fn filter(id: &str, column: ColumnRef, operator: FilterOperator, values: Vec<Value>) -> MatchCandidate {
    candidate(
        id,
        0.8,
        ComponentPayload::Filter(FilterPayload {
            column,
            operator,
            values,
        }),
    )
}

/// Sales by customer segment for the west region, biggest first.
fn revenue_by_segment() -> CandidateSet {
    CandidateSet::from_candidates(vec![
        table("t-sales", "sales"),
        candidate(
            "j-customer",
            0.8,
            ComponentPayload::Join(JoinPayload {
                left_table: "sales".into(),
                right_table: "customers".into(),
                left_column: "customer_id".into(),
                right_column: "id".into(),
                kind: JoinKind::Left,
            }),
        ),
        candidate(
            "a-revenue",
            0.85,
            ComponentPayload::Aggregate(AggregatePayload {
                function: AggregateFunction::Sum,
                column: ColumnRef::new("sales", "amount"),
                alias: "revenue".into(),
            }),
        ),
        candidate(
            "g-segment",
            0.7,
            ComponentPayload::GroupBy(GroupByPayload {
                columns: vec![ColumnRef::new("customers", "segment")],
            }),
        ),
        filter(
            "f-west",
            ColumnRef::new("sales", "region"),
            FilterOperator::Equals,
            vec![Value::from("west")],
        ),
        candidate(
            "o-amount",
            0.6,
            ComponentPayload::OrderBy(OrderByPayload {
                column: ColumnRef::new("sales", "amount"),
                direction: SortDirection::Desc,
            }),
        ),
        candidate(
            "l-5",
            0.5,
            ComponentPayload::Limit(LimitPayload {
                limit: 5,
                offset: None,
            }),
        ),
    ])
}

fn compile_all(candidates: &CandidateSet) -> Vec<CompiledQuery> {
    let plan = PlanAssembler::new().assemble(candidates).unwrap();
    Dialect::ALL
        .iter()
        .map(|d| SqlCompiler::new(*d).compile(&plan).unwrap())
        .collect()
}

// ============================================================================
// Dialect coverage
// ============================================================================

#[test]
fn test_grouped_join_parses_in_every_dialect() {
    for query in compile_all(&revenue_by_segment()) {
        parse(&query);
        assert_eq!(query.parameters, vec![Value::from("west")]);
    }
}

#[test]
fn test_grouped_join_duckdb_text() {
    let plan = PlanAssembler::new().assemble(&revenue_by_segment()).unwrap();
    let query = SqlCompiler::new(Dialect::DuckDb).compile(&plan).unwrap();

    insta::assert_snapshot!(query.sql, @r#"
    SELECT
      "c"."segment",
      SUM("s"."amount") AS "revenue"
    FROM "sales" AS "s"
    LEFT JOIN "customers" AS "c" ON "s"."customer_id" = "c"."id"
    WHERE "s"."region" = $1
    GROUP BY "c"."segment"
    ORDER BY "revenue" DESC
    LIMIT 5
    "#);
}

#[test]
fn test_every_operator_parses_in_every_dialect() {
    let amount = || ColumnRef::new("sales", "amount");
    let candidates = CandidateSet::from_candidates(vec![
        table("t-sales", "sales"),
        filter("f1", ColumnRef::new("sales", "region"), FilterOperator::Equals, vec!["west".into()]),
        filter("f2", ColumnRef::new("sales", "channel"), FilterOperator::NotEquals, vec!["web".into()]),
        filter("f3", amount(), FilterOperator::GreaterThan, vec![Value::Int(10)]),
        filter("f4", amount(), FilterOperator::LessThan, vec![Value::Int(1000)]),
        filter("f5", ColumnRef::new("sales", "tax"), FilterOperator::Gte, vec![Value::Float(0.5)]),
        filter("f6", ColumnRef::new("sales", "tax"), FilterOperator::Lte, vec![Value::Float(9.5)]),
        filter(
            "f7",
            ColumnRef::new("sales", "sold_on"),
            FilterOperator::Between,
            vec!["2024-01-01".into(), "2024-12-31".into()],
        ),
        filter(
            "f8",
            ColumnRef::new("sales", "status"),
            FilterOperator::In,
            vec!["open".into(), "paid".into(), "void".into()],
        ),
        filter("f9", ColumnRef::new("sales", "note"), FilterOperator::Contains, vec!["50%_off".into()]),
        candidate(
            "c-region",
            0.5,
            ComponentPayload::Column(ColumnPayload {
                column: ColumnRef::new("sales", "region"),
                alias: Some("sales_region".into()),
            }),
        ),
    ]);

    for query in compile_all(&candidates) {
        parse(&query);
        assert_eq!(query.parameters.len(), 12, "{}", query.sql);
        let pattern = match query.dialect {
            Dialect::BigQuery => r"%50\%\_off%",
            _ => "%50!%!_off%",
        };
        assert_eq!(
            query.parameters.last(),
            Some(&Value::from(pattern)),
            "CONTAINS binds an escaped pattern"
        );
        assert_eq!(
            query.sql.contains("ESCAPE"),
            query.dialect != Dialect::BigQuery,
            "{}",
            query.sql
        );
    }
}

#[test]
fn test_offset_without_order_parses_in_tsql() {
    let candidates = CandidateSet::from_candidates(vec![
        table("t-sales", "sales"),
        candidate(
            "l-page",
            0.5,
            ComponentPayload::Limit(LimitPayload {
                limit: 20,
                offset: Some(40),
            }),
        ),
    ]);
    let plan = PlanAssembler::new().assemble(&candidates).unwrap();
    let query = SqlCompiler::new(Dialect::TSql).compile(&plan).unwrap();

    assert!(query.sql.contains("ORDER BY (SELECT NULL)"), "{}", query.sql);
    assert!(query.sql.contains("OFFSET 40 ROWS"), "{}", query.sql);
    parse(&query);
}

// ============================================================================
// Injection safety
// ============================================================================

#[test]
fn test_hostile_filter_values_never_reach_sql_text() {
    let hostile = "x'; DROP TABLE sales; --";
    let candidates = CandidateSet::from_candidates(vec![
        table("t-sales", "sales"),
        filter(
            "f-evil",
            ColumnRef::new("sales", "region"),
            FilterOperator::Equals,
            vec![Value::from(hostile)],
        ),
    ]);

    for query in compile_all(&candidates) {
        assert!(!query.sql.contains("DROP"), "{}", query.sql);
        assert!(!query.sql.contains('\''), "{}", query.sql);
        assert_eq!(query.parameters, vec![Value::from(hostile)]);
        parse(&query);
    }
}

#[test]
fn test_unsafe_identifier_rejected_in_every_dialect() {
    let candidates = CandidateSet::from_candidates(vec![
        table("t-sales", "sales"),
        candidate(
            "c-evil",
            0.5,
            ComponentPayload::Column(ColumnPayload {
                column: ColumnRef::new("sales", "amount\"; DELETE FROM sales; --"),
                alias: None,
            }),
        ),
    ]);
    let plan = PlanAssembler::new().assemble(&candidates).unwrap();

    for dialect in Dialect::ALL {
        let err = SqlCompiler::new(dialect).compile(&plan).unwrap_err();
        assert_eq!(err.context, "column");
        assert!(err.identifier.contains("DELETE"));
    }
}
