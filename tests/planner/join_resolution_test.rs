//! Join tree construction: multi-hop chains, orientation and connectivity.

use nlsql::component::{ColumnRef, ComponentId, ComponentPayload, DslComponent, JoinKind, JoinPayload, TablePayload};
use nlsql::matcher::{CandidateSet, MatchCandidate};
use nlsql::planner::{resolve_joins, PlanAssembler, PlanConflictError};

fn payload(left: &str, right: &str, kind: JoinKind) -> JoinPayload {
    JoinPayload {
        left_table: left.into(),
        right_table: right.into(),
        left_column: "ref_id".into(),
        right_column: "id".into(),
        kind,
    }
}

fn joins(specs: &[(&str, &str, &str)]) -> Vec<(ComponentId, JoinPayload)> {
    specs
        .iter()
        .map(|(id, l, r)| (ComponentId::new(*id), payload(l, r, JoinKind::Inner)))
        .collect()
}

fn candidate(id: &str, similarity: f32, payload: ComponentPayload) -> MatchCandidate {
    MatchCandidate {
        component: DslComponent::new(id, format!("component {}", id), payload),
        similarity,
        rank: 0,
    }
}

#[test]
fn test_chain_resolved_in_any_order() {
    // Best-first order lists the far end of the chain first
    let res = resolve_joins(
        "sales",
        &joins(&[
            ("j3", "regions", "countries"),
            ("j2", "stores", "regions"),
            ("j1", "sales", "stores"),
        ]),
    )
    .unwrap();

    assert_eq!(res.tables, vec!["sales", "stores", "regions", "countries"]);
    let order: Vec<&str> = res.joins.iter().map(|j| j.component.as_str()).collect();
    assert_eq!(order, vec!["j1", "j2", "j3"]);
}

#[test]
fn test_star_schema() {
    let res = resolve_joins(
        "sales",
        &joins(&[
            ("j1", "sales", "customers"),
            ("j2", "products", "sales"),
            ("j3", "sales", "stores"),
        ]),
    )
    .unwrap();

    assert_eq!(res.tables, vec!["sales", "customers", "products", "stores"]);
    // products was the left side, so the edge is read from sales
    assert_eq!(res.joins[1].from, ColumnRef::new("sales", "id"));
    assert_eq!(res.joins[1].to, ColumnRef::new("products", "ref_id"));
}

#[test]
fn test_cycle_closing_join_is_dropped() {
    let res = resolve_joins(
        "a",
        &joins(&[("j1", "a", "b"), ("j2", "b", "c"), ("j3", "c", "a")]),
    )
    .unwrap();

    assert_eq!(res.joins.len(), 2);
    assert_eq!(res.tables, vec!["a", "b", "c"]);
}

#[test]
fn test_right_join_read_backwards_becomes_left() {
    let res = resolve_joins(
        "sales",
        &[(
            ComponentId::new("j1"),
            payload("customers", "sales", JoinKind::Right),
        )],
    )
    .unwrap();

    assert_eq!(res.joins[0].kind, JoinKind::Left);
    assert_eq!(res.joins[0].to.table, "customers");
}

#[test]
fn test_full_join_kind_is_symmetric() {
    let res = resolve_joins(
        "sales",
        &[(
            ComponentId::new("j1"),
            payload("customers", "sales", JoinKind::Full),
        )],
    )
    .unwrap();
    assert_eq!(res.joins[0].kind, JoinKind::Full);
}

#[test]
fn test_island_reports_every_unresolved_join() {
    let err = resolve_joins(
        "sales",
        &joins(&[("j1", "products", "suppliers"), ("j2", "suppliers", "countries")]),
    )
    .unwrap_err();

    match err {
        PlanConflictError::DisconnectedJoin { root, unresolved } => {
            assert_eq!(root, "sales");
            assert_eq!(unresolved, vec![ComponentId::new("j1"), ComponentId::new("j2")]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_assembled_plan_is_a_spanning_tree_with_unique_aliases() {
    let table = |id: &str, name: &str| {
        candidate(
            id,
            0.9,
            ComponentPayload::Table(TablePayload {
                table: name.into(),
                alias: None,
            }),
        )
    };
    let join = |id: &str, sim: f32, l: &str, r: &str| {
        candidate(id, sim, ComponentPayload::Join(payload(l, r, JoinKind::Inner)))
    };

    let plan = PlanAssembler::new()
        .assemble(&CandidateSet::from_candidates(vec![
            table("t1", "sales"),
            join("j1", 0.9, "sales", "stores"),
            join("j2", 0.8, "stores", "suppliers"),
            join("j3", 0.7, "suppliers", "sales"),
            join("j4", 0.6, "sales", "shipments"),
        ]))
        .unwrap();

    assert!(plan.is_connected());
    assert_eq!(plan.joins.len(), 3);

    let aliases: Vec<&str> = plan.aliases.iter().map(|b| b.alias.as_str()).collect();
    assert_eq!(aliases, vec!["s", "s2", "s3", "s4"]);
}

#[test]
fn test_disconnected_candidate_set_fails_assembly() {
    let err = PlanAssembler::new()
        .assemble(&CandidateSet::from_candidates(vec![
            candidate(
                "t1",
                0.9,
                ComponentPayload::Table(TablePayload {
                    table: "sales".into(),
                    alias: None,
                }),
            ),
            candidate(
                "j1",
                0.8,
                ComponentPayload::Join(payload("products", "suppliers", JoinKind::Inner)),
            ),
        ]))
        .unwrap_err();

    assert!(matches!(err, PlanConflictError::DisconnectedJoin { .. }));
    assert!(err.to_string().contains("j1"));
}
