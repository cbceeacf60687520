//! Logical plan types.

use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use serde::Serialize;
use std::collections::BTreeMap;

use super::AliasRegistry;
use crate::component::{
    AggregateFunction, ComponentId, FilterOperator, JoinKind, SortDirection, Value,
};

/// A table in the plan with its SQL alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableBinding {
    pub table: String,
    pub alias: String,
}

/// A column resolved against the alias registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PlanColumn {
    pub table: String,
    pub table_alias: String,
    pub column: String,
}

impl PlanColumn {
    pub fn same_column(&self, other: &PlanColumn) -> bool {
        self.table == other.table && self.column == other.column
    }
}

/// One join: `to.table` enters the plan, `from.table` is already in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinEdge {
    pub component: ComponentId,
    pub kind: JoinKind,
    pub from: PlanColumn,
    pub to: PlanColumn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterPredicate {
    pub component: ComponentId,
    pub column: PlanColumn,
    pub operator: FilterOperator,
    pub values: Vec<Value>,
}

/// A bare (non-aggregated) output column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub component: ComponentId,
    pub column: PlanColumn,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateExpr {
    pub component: ComponentId,
    pub function: AggregateFunction,
    pub column: PlanColumn,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderTarget {
    Column(PlanColumn),
    /// Sort on an aggregate's output alias.
    Aggregate { alias: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderKey {
    pub component: ComponentId,
    pub target: OrderTarget,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitClause {
    pub component: ComponentId,
    pub limit: u64,
    pub offset: Option<u64>,
}

/// A fully resolved query shape.
///
/// Every table a clause mentions is bound in `aliases`, and `joins` connect
/// all bound tables to `root` as a tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalPlan {
    pub root: TableBinding,
    pub joins: Vec<JoinEdge>,
    pub filters: Vec<FilterPredicate>,
    pub projections: Vec<Projection>,
    pub aggregates: Vec<AggregateExpr>,
    pub group_by: Vec<PlanColumn>,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<LimitClause>,
    pub aliases: AliasRegistry,
}

impl LogicalPlan {
    /// Tables in the order they enter the FROM clause.
    pub fn tables(&self) -> Vec<&str> {
        self.aliases.iter().map(|b| b.table.as_str()).collect()
    }

    pub fn has_aggregates(&self) -> bool {
        !self.aggregates.is_empty()
    }

    /// Whether the join edges form one tree spanning every bound table.
    pub fn is_connected(&self) -> bool {
        let mut graph = UnGraph::<&str, ()>::new_undirected();
        let mut nodes = BTreeMap::new();
        for binding in self.aliases.iter() {
            nodes.insert(binding.table.as_str(), graph.add_node(binding.table.as_str()));
        }
        if !nodes.contains_key(self.root.table.as_str()) {
            return false;
        }
        for edge in &self.joins {
            match (
                nodes.get(edge.from.table.as_str()),
                nodes.get(edge.to.table.as_str()),
            ) {
                (Some(&a), Some(&b)) => {
                    graph.add_edge(a, b, ());
                }
                _ => return false,
            }
        }
        graph.edge_count() + 1 == graph.node_count() && connected_components(&graph) == 1
    }
}
