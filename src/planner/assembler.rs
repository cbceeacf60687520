//! Plan assembly.
//!
//! Resolves a [`CandidateSet`] into a single [`LogicalPlan`]. Retrieval
//! returns overlapping and sometimes contradictory fragments; assembly picks
//! a root table, connects joined tables, drops fragments that reference
//! tables outside the plan, collapses duplicates and repairs the grouping so
//! the result is always a valid query.
//!
//! Within every category candidates are considered by similarity descending,
//! then component id ascending, so the same candidate set always produces
//! the same plan.

use std::collections::{BTreeMap, BTreeSet};

use super::join_builder::resolve_joins;
use super::logical::{
    AggregateExpr, AliasRegistry, FilterPredicate, JoinEdge, LimitClause, LogicalPlan, OrderKey,
    OrderTarget, PlanColumn, Projection, TableBinding,
};
use super::{PlanConflictError, PlanResult};
use crate::component::{
    AggregateFunction, Category, ColumnRef, ComponentId, ComponentPayload, FilterOperator,
    JoinPayload,
};
use crate::matcher::{CandidateSet, MatchCandidate};

/// Builds logical plans from retrieved candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanAssembler;

impl PlanAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, candidates: &CandidateSet) -> PlanResult<LogicalPlan> {
        let tables = sorted(candidates, Category::Table);

        // Preferred alias per table, from its best TABLE candidate that names one
        let mut preferred: BTreeMap<&str, &str> = BTreeMap::new();
        for c in &tables {
            if let ComponentPayload::Table(t) = &c.component.payload {
                if let Some(alias) = t.alias.as_deref() {
                    preferred.entry(t.table.as_str()).or_insert(alias);
                }
            }
        }

        let root = tables
            .iter()
            .find_map(|c| match &c.component.payload {
                ComponentPayload::Table(t) => Some(t.table.as_str()),
                _ => None,
            })
            .ok_or(PlanConflictError::NoRootTable)?;

        let join_candidates: Vec<(ComponentId, JoinPayload)> = sorted(candidates, Category::Join)
            .into_iter()
            .filter_map(|c| match &c.component.payload {
                ComponentPayload::Join(j) => Some((c.component.id.clone(), j.clone())),
                _ => None,
            })
            .collect();
        let resolution = resolve_joins(root, &join_candidates)?;

        let mut aliases = AliasRegistry::new();
        for table in &resolution.tables {
            aliases.assign(table, preferred.get(table.as_str()).copied());
        }

        for c in &tables {
            if let ComponentPayload::Table(t) = &c.component.payload {
                if !aliases.contains(&t.table) {
                    tracing::info!(
                        id = %c.component.id,
                        table = %t.table,
                        "planner.assemble.drop_unjoined_table"
                    );
                }
            }
        }

        let builder = Builder {
            plan_root: TableBinding {
                table: root.to_string(),
                alias: aliases.get(root).unwrap_or(root).to_string(),
            },
            aliases,
        };

        let joins = resolution
            .joins
            .iter()
            .filter_map(|j| {
                Some(JoinEdge {
                    component: j.component.clone(),
                    kind: j.kind,
                    from: builder.bind(&j.from)?,
                    to: builder.bind(&j.to)?,
                })
            })
            .collect();

        let projections = builder.projections(&sorted(candidates, Category::Column));
        let filters = builder.filters(&sorted(candidates, Category::Filter));
        let mut group_by = builder.group_by(&sorted(candidates, Category::GroupBy));
        let aggregates = builder.aggregates(
            &sorted(candidates, Category::Aggregate),
            output_names(&projections, &group_by),
        );
        reconcile_grouping(&mut group_by, &projections, &aggregates);
        let order_by = builder.order_by(
            &sorted(candidates, Category::OrderBy),
            &group_by,
            &aggregates,
        );
        let limit = builder.limit(&sorted(candidates, Category::Limit));

        let plan = LogicalPlan {
            root: builder.plan_root,
            joins,
            filters,
            projections,
            aggregates,
            group_by,
            order_by,
            limit,
            aliases: builder.aliases,
        };

        tracing::debug!(
            root = %plan.root.table,
            tables = plan.aliases.len(),
            filters = plan.filters.len(),
            aggregates = plan.aggregates.len(),
            "planner.assemble.done"
        );
        debug_assert!(plan.is_connected());
        Ok(plan)
    }
}

/// Candidates of one category, best first with ties broken by smallest id.
fn sorted(candidates: &CandidateSet, category: Category) -> Vec<&MatchCandidate> {
    let mut list: Vec<&MatchCandidate> = candidates.get(category).iter().collect();
    list.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.component.id.cmp(&b.component.id))
    });
    list
}

fn drop_irrelevant(candidate: &MatchCandidate, table: &str) {
    tracing::info!(
        id = %candidate.component.id,
        category = %candidate.component.category(),
        table,
        "planner.assemble.drop_irrelevant"
    );
}

fn drop_duplicate(candidate: &MatchCandidate) {
    tracing::info!(
        id = %candidate.component.id,
        category = %candidate.component.category(),
        "planner.assemble.drop_duplicate"
    );
}

/// Lowercased SELECT output names of plain columns and group keys.
fn output_names(projections: &[Projection], group_by: &[PlanColumn]) -> BTreeSet<String> {
    let projected = projections
        .iter()
        .map(|p| p.alias.as_deref().unwrap_or(&p.column.column));
    let grouped = group_by.iter().map(|key| {
        projections
            .iter()
            .find(|p| p.column.same_column(key))
            .and_then(|p| p.alias.as_deref())
            .unwrap_or(&key.column)
    });
    projected
        .chain(grouped)
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Aggregates mixed with bare columns need every bare column grouped.
///
/// With no GROUP_BY candidate the grouping is synthesized from the bare
/// columns; an existing grouping is extended rather than dropping a column.
fn reconcile_grouping(
    group_by: &mut Vec<PlanColumn>,
    projections: &[Projection],
    aggregates: &[AggregateExpr],
) {
    if aggregates.is_empty() && group_by.is_empty() {
        return;
    }
    let synthesized = group_by.is_empty();
    let mut added = 0usize;
    for p in projections {
        if !group_by.iter().any(|g| g.same_column(&p.column)) {
            group_by.push(p.column.clone());
            added += 1;
        }
    }
    if added > 0 && synthesized {
        tracing::info!(columns = added, "planner.assemble.synthesize_group_by");
    } else if added > 0 {
        tracing::info!(columns = added, "planner.assemble.extend_group_by");
    }
}

struct Builder {
    aliases: AliasRegistry,
    plan_root: TableBinding,
}

impl Builder {
    fn bind(&self, column: &ColumnRef) -> Option<PlanColumn> {
        self.aliases.get(&column.table).map(|alias| PlanColumn {
            table: column.table.clone(),
            table_alias: alias.to_string(),
            column: column.column.clone(),
        })
    }

    fn bind_or_drop(&self, candidate: &MatchCandidate, column: &ColumnRef) -> Option<PlanColumn> {
        let bound = self.bind(column);
        if bound.is_none() {
            drop_irrelevant(candidate, &column.table);
        }
        bound
    }

    fn projections(&self, candidates: &[&MatchCandidate]) -> Vec<Projection> {
        let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
        let mut out = Vec::new();
        for c in candidates {
            let ComponentPayload::Column(payload) = &c.component.payload else {
                continue;
            };
            let Some(column) = self.bind_or_drop(c, &payload.column) else {
                continue;
            };
            if !seen.insert((column.table.clone(), column.column.clone())) {
                drop_duplicate(c);
                continue;
            }
            out.push(Projection {
                component: c.component.id.clone(),
                column,
                alias: payload.alias.clone(),
            });
        }
        out
    }

    fn filters(&self, candidates: &[&MatchCandidate]) -> Vec<FilterPredicate> {
        let mut seen: BTreeSet<(String, String, FilterOperator)> = BTreeSet::new();
        let mut out = Vec::new();
        for c in candidates {
            let ComponentPayload::Filter(payload) = &c.component.payload else {
                continue;
            };
            let Some(column) = self.bind_or_drop(c, &payload.column) else {
                continue;
            };
            if !seen.insert((column.table.clone(), column.column.clone(), payload.operator)) {
                drop_duplicate(c);
                continue;
            }
            out.push(FilterPredicate {
                component: c.component.id.clone(),
                column,
                operator: payload.operator,
                values: payload.values.clone(),
            });
        }
        out
    }

    /// Aggregate aliases are kept unique against each other and against
    /// `used_aliases`, the names plain columns already take in the SELECT.
    fn aggregates(
        &self,
        candidates: &[&MatchCandidate],
        mut used_aliases: BTreeSet<String>,
    ) -> Vec<AggregateExpr> {
        let mut seen: BTreeSet<(AggregateFunction, String, String)> = BTreeSet::new();
        let mut out = Vec::new();
        for c in candidates {
            let ComponentPayload::Aggregate(payload) = &c.component.payload else {
                continue;
            };
            let Some(column) = self.bind_or_drop(c, &payload.column) else {
                continue;
            };
            if !seen.insert((payload.function, column.table.clone(), column.column.clone())) {
                drop_duplicate(c);
                continue;
            }

            let mut alias = payload.alias.clone();
            let mut n = 2;
            while used_aliases.contains(&alias.to_ascii_lowercase()) {
                alias = format!("{}_{}", payload.alias, n);
                n += 1;
            }
            used_aliases.insert(alias.to_ascii_lowercase());

            out.push(AggregateExpr {
                component: c.component.id.clone(),
                function: payload.function,
                column,
                alias,
            });
        }
        out
    }

    /// The best GROUP_BY candidate whose columns all bind.
    fn group_by(&self, candidates: &[&MatchCandidate]) -> Vec<PlanColumn> {
        let mut chosen: Option<Vec<PlanColumn>> = None;
        for c in candidates {
            let ComponentPayload::GroupBy(payload) = &c.component.payload else {
                continue;
            };
            if chosen.is_some() {
                drop_duplicate(c);
                continue;
            }
            let bound: Option<Vec<PlanColumn>> =
                payload.columns.iter().map(|col| self.bind(col)).collect();
            match bound {
                Some(columns) => {
                    let mut unique: Vec<PlanColumn> = Vec::with_capacity(columns.len());
                    for col in columns {
                        if !unique.iter().any(|u| u.same_column(&col)) {
                            unique.push(col);
                        }
                    }
                    chosen = Some(unique);
                }
                None => {
                    let missing = payload
                        .columns
                        .iter()
                        .find(|col| !self.aliases.contains(&col.table))
                        .map(|col| col.table.as_str())
                        .unwrap_or_default();
                    drop_irrelevant(c, missing);
                }
            }
        }
        chosen.unwrap_or_default()
    }

    /// Order keys. In a grouped query a key must be a group key; otherwise
    /// it falls back to an aggregate over the same column, or is dropped.
    fn order_by(
        &self,
        candidates: &[&MatchCandidate],
        group_by: &[PlanColumn],
        aggregates: &[AggregateExpr],
    ) -> Vec<OrderKey> {
        let grouped = !group_by.is_empty() || !aggregates.is_empty();
        let mut seen: Vec<OrderTarget> = Vec::new();
        let mut out = Vec::new();

        for c in candidates {
            let ComponentPayload::OrderBy(payload) = &c.component.payload else {
                continue;
            };
            let Some(column) = self.bind_or_drop(c, &payload.column) else {
                continue;
            };

            let target = if !grouped || group_by.iter().any(|g| g.same_column(&column)) {
                OrderTarget::Column(column)
            } else if let Some(agg) = aggregates.iter().find(|a| a.column.same_column(&column)) {
                OrderTarget::Aggregate {
                    alias: agg.alias.clone(),
                }
            } else {
                tracing::info!(
                    id = %c.component.id,
                    column = %payload.column,
                    "planner.assemble.drop_ungrouped_order"
                );
                continue;
            };

            if seen.contains(&target) {
                drop_duplicate(c);
                continue;
            }
            seen.push(target.clone());
            out.push(OrderKey {
                component: c.component.id.clone(),
                target,
                direction: payload.direction,
            });
        }
        out
    }

    /// The most restrictive LIMIT wins.
    fn limit(&self, candidates: &[&MatchCandidate]) -> Option<LimitClause> {
        let mut best: Option<LimitClause> = None;
        for c in candidates {
            let ComponentPayload::Limit(payload) = &c.component.payload else {
                continue;
            };
            match &best {
                Some(b) if b.limit <= payload.limit => drop_duplicate(c),
                _ => {
                    if best.is_some() {
                        tracing::info!(id = %c.component.id, "planner.assemble.tighter_limit");
                    }
                    best = Some(LimitClause {
                        component: c.component.id.clone(),
                        limit: payload.limit,
                        offset: payload.offset,
                    });
                }
            }
        }
        best
    }
}
