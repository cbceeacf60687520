//! Join resolution.
//!
//! Turns the retrieved JOIN candidates into a join tree rooted at the FROM
//! table. Candidates are visited best first and each pass accepts every join
//! that has exactly one endpoint already in the plan. Passes repeat until all
//! joins are accepted or dropped, or a pass makes no progress.

use std::collections::BTreeSet;

use crate::component::{ColumnRef, ComponentId, JoinKind, JoinPayload};
use crate::planner::{PlanConflictError, PlanResult};

/// A join oriented from the side already in the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJoin {
    pub component: ComponentId,
    pub kind: JoinKind,
    /// Column on the table already in the plan.
    pub from: ColumnRef,
    /// Column on the table this join brings in.
    pub to: ColumnRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinResolution {
    /// Root first, then tables in the order their joins were accepted.
    pub tables: Vec<String>,
    pub joins: Vec<ResolvedJoin>,
}

/// Resolve `candidates` (already in preference order) against `root`.
pub fn resolve_joins(
    root: &str,
    candidates: &[(ComponentId, JoinPayload)],
) -> PlanResult<JoinResolution> {
    let mut present: BTreeSet<&str> = BTreeSet::from([root]);
    let mut tables = vec![root.to_string()];
    let mut joins = Vec::new();
    let mut pending: Vec<&(ComponentId, JoinPayload)> = candidates.iter().collect();

    while !pending.is_empty() {
        let mut deferred = Vec::new();
        let before = pending.len();

        for entry in pending {
            let (id, join) = entry;
            let has_left = present.contains(join.left_table.as_str());
            let has_right = present.contains(join.right_table.as_str());

            match (has_left, has_right) {
                (true, true) => {
                    tracing::info!(
                        id = %id,
                        left = %join.left_table,
                        right = %join.right_table,
                        "planner.joins.drop_redundant"
                    );
                }
                (true, false) => {
                    present.insert(join.right_table.as_str());
                    tables.push(join.right_table.clone());
                    joins.push(ResolvedJoin {
                        component: id.clone(),
                        kind: join.kind,
                        from: join.left(),
                        to: join.right(),
                    });
                }
                (false, true) => {
                    present.insert(join.left_table.as_str());
                    tables.push(join.left_table.clone());
                    joins.push(ResolvedJoin {
                        component: id.clone(),
                        kind: join.kind.flipped(),
                        from: join.right(),
                        to: join.left(),
                    });
                }
                (false, false) => deferred.push(entry),
            }
        }

        if deferred.len() == before {
            let unresolved: Vec<ComponentId> = deferred.iter().map(|(id, _)| id.clone()).collect();
            tracing::info!(
                root,
                unresolved = unresolved.len(),
                "planner.joins.disconnected"
            );
            return Err(PlanConflictError::DisconnectedJoin {
                root: root.to_string(),
                unresolved,
            });
        }
        pending = deferred;
    }

    Ok(JoinResolution { tables, joins })
}
