//! Plan assembly over hand-built candidate sets.

use nlsql::component::{
    AggregateFunction, AggregatePayload, ColumnPayload, ColumnRef, ComponentPayload, DslComponent,
    FilterOperator, FilterPayload, JoinKind, JoinPayload, TablePayload, Value,
};
use nlsql::matcher::{CandidateSet, MatchCandidate};
use nlsql::planner::logical::LogicalPlan;
use nlsql::planner::{PlanAssembler, PlanConflictError};

// ============================================================================
// Helpers
// ============================================================================

fn candidate(id: &str, similarity: f32, payload: ComponentPayload) -> MatchCandidate {
    MatchCandidate {
        component: DslComponent::new(id, format!("component {}", id), payload),
        similarity,
        rank: 0,
    }
}

fn table(id: &str, similarity: f32, name: &str) -> MatchCandidate {
    candidate(
        id,
        similarity,
        ComponentPayload::Table(TablePayload {
            table: name.into(),
            alias: None,
        }),
    )
}

fn join(id: &str, similarity: f32, left: (&str, &str), right: (&str, &str)) -> MatchCandidate {
    candidate(
        id,
        similarity,
        ComponentPayload::Join(JoinPayload {
            left_table: left.0.into(),
            left_column: left.1.into(),
            right_table: right.0.into(),
            right_column: right.1.into(),
            kind: JoinKind::Inner,
        }),
    )
}

fn column(id: &str, similarity: f32, table: &str, name: &str) -> MatchCandidate {
    candidate(
        id,
        similarity,
        ComponentPayload::Column(ColumnPayload {
            column: ColumnRef::new(table, name),
            alias: None,
        }),
    )
}

fn filter(id: &str, similarity: f32, value: &str) -> MatchCandidate {
    candidate(
        id,
        similarity,
        ComponentPayload::Filter(FilterPayload {
            column: ColumnRef::new("sales", "region"),
            operator: FilterOperator::Equals,
            values: vec![Value::from(value)],
        }),
    )
}

fn assemble(candidates: Vec<MatchCandidate>) -> Result<LogicalPlan, PlanConflictError> {
    PlanAssembler::new().assemble(&CandidateSet::from_candidates(candidates))
}

// ============================================================================
// Root selection
// ============================================================================

#[test]
fn test_highest_similarity_table_is_root() {
    let plan = assemble(vec![table("t-orders", 0.6, "orders"), table("t-sales", 0.9, "sales")])
        .unwrap();

    assert_eq!(plan.root.table, "sales");
    assert_eq!(plan.root.alias, "s");
    assert_eq!(plan.tables(), vec!["sales"]);
}

#[test]
fn test_no_table_candidate_is_a_conflict() {
    let err = assemble(vec![join(
        "j1",
        0.9,
        ("sales", "customer_id"),
        ("customers", "id"),
    )])
    .unwrap_err();

    assert_eq!(err, PlanConflictError::NoRootTable);
}

#[test]
fn test_empty_candidate_set_is_a_conflict() {
    let err = PlanAssembler::new()
        .assemble(&CandidateSet::new())
        .unwrap_err();
    assert_eq!(err, PlanConflictError::NoRootTable);
}

// ============================================================================
// Joins
// ============================================================================

#[test]
fn test_join_brings_in_second_table() {
    let plan = assemble(vec![
        table("t-sales", 0.9, "sales"),
        join("j1", 0.8, ("sales", "customer_id"), ("customers", "id")),
    ])
    .unwrap();

    assert_eq!(plan.tables(), vec!["sales", "customers"]);
    assert_eq!(plan.aliases.get("sales"), Some("s"));
    assert_eq!(plan.aliases.get("customers"), Some("c"));

    let edge = &plan.joins[0];
    assert_eq!(edge.from.table_alias, "s");
    assert_eq!(edge.from.column, "customer_id");
    assert_eq!(edge.to.table_alias, "c");
    assert_eq!(edge.to.column, "id");
    assert!(plan.is_connected());
}

// ============================================================================
// Binding, dedup and grouping
// ============================================================================

#[test]
fn test_aggregate_with_bare_column_synthesizes_group_by() {
    let plan = assemble(vec![
        table("t-sales", 0.9, "sales"),
        column("c-region", 0.7, "sales", "region"),
        candidate(
            "a-total",
            0.8,
            ComponentPayload::Aggregate(AggregatePayload {
                function: AggregateFunction::Sum,
                column: ColumnRef::new("sales", "amount"),
                alias: "total_amount".into(),
            }),
        ),
    ])
    .unwrap();

    assert_eq!(plan.group_by.len(), 1);
    assert_eq!(plan.group_by[0].table, "sales");
    assert_eq!(plan.group_by[0].column, "region");
    assert_eq!(plan.aggregates[0].alias, "total_amount");
}

#[test]
fn test_duplicate_filters_keep_highest_similarity() {
    let plan = assemble(vec![
        table("t-sales", 0.9, "sales"),
        filter("f-east", 0.8, "east"),
        filter("f-west", 0.95, "west"),
    ])
    .unwrap();

    assert_eq!(plan.filters.len(), 1);
    assert_eq!(plan.filters[0].component.as_str(), "f-west");
    assert_eq!(plan.filters[0].values, vec![Value::from("west")]);
}

#[test]
fn test_fragments_for_unplanned_tables_are_dropped() {
    let plan = assemble(vec![
        table("t-sales", 0.9, "sales"),
        column("c-region", 0.9, "sales", "region"),
        column("c-segment", 0.9, "customers", "segment"),
    ])
    .unwrap();

    assert_eq!(plan.projections.len(), 1);
    assert_eq!(plan.projections[0].column.column, "region");
}

#[test]
fn test_assembly_is_deterministic() {
    let candidates = vec![
        table("t-sales", 0.9, "sales"),
        table("t-stores", 0.9, "stores"),
        join("j1", 0.7, ("sales", "store_id"), ("stores", "id")),
        join("j2", 0.7, ("stores", "id"), ("sales", "store_id")),
        column("c2", 0.5, "stores", "city"),
        column("c1", 0.5, "sales", "region"),
        filter("f2", 0.6, "west"),
        filter("f1", 0.6, "east"),
    ];

    let first = assemble(candidates.clone()).unwrap();
    for _ in 0..5 {
        let mut shuffled = candidates.clone();
        shuffled.reverse();
        assert_eq!(assemble(shuffled).unwrap(), first);
    }

    // Equal similarity ties go to the smallest id
    assert_eq!(first.root.table, "sales");
    assert_eq!(first.joins[0].component.as_str(), "j1");
    assert_eq!(first.filters[0].component.as_str(), "f1");
    let projected: Vec<&str> = first
        .projections
        .iter()
        .map(|p| p.component.as_str())
        .collect();
    assert_eq!(projected, vec!["c1", "c2"]);
}
