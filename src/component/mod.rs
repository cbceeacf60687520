//! DSL component model.
//!
//! A component is one typed, independently retrievable query fragment: a
//! table, a column, a join, a filter predicate, an aggregate, a grouping, an
//! ordering or a row limit. Every component carries a natural-language
//! description which is what gets embedded and matched against questions.
//!
//! Payloads always reference tables by their logical name. Aliases only come
//! into existence when the planner assembles a query.

pub mod error;
pub mod loader;
pub mod registry;
pub mod validate;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use error::{ValidationError, ValidationResult};
pub use loader::{
    load_components, parse_components, seed_from_schema, LoaderError, SchemaDescription,
};
pub use registry::{ComponentRegistry, RegisterOutcome, RegisterSummary, RegistryError};
pub use validate::validate;

// =============================================================================
// Identity
// =============================================================================

/// Stable identifier of a registered component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// Category
// =============================================================================

/// The closed set of component kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[serde(alias = "table")]
    Table,
    #[serde(alias = "column")]
    Column,
    #[serde(alias = "join")]
    Join,
    #[serde(alias = "filter")]
    Filter,
    #[serde(alias = "aggregate")]
    Aggregate,
    #[serde(alias = "group_by")]
    GroupBy,
    #[serde(alias = "order_by")]
    OrderBy,
    #[serde(alias = "limit")]
    Limit,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Table,
        Category::Column,
        Category::Join,
        Category::Filter,
        Category::Aggregate,
        Category::GroupBy,
        Category::OrderBy,
        Category::Limit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Table => "TABLE",
            Category::Column => "COLUMN",
            Category::Join => "JOIN",
            Category::Filter => "FILTER",
            Category::Aggregate => "AGGREGATE",
            Category::GroupBy => "GROUP_BY",
            Category::OrderBy => "ORDER_BY",
            Category::Limit => "LIMIT",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

// =============================================================================
// Payload building blocks
// =============================================================================

/// A column addressed by logical table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A literal carried by a FILTER. Never rendered into SQL text directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    /// The kind to use when the join is read from the other side.
    ///
    /// `a LEFT JOIN b` preserves `a`; written from `b` that is `b RIGHT JOIN a`.
    pub fn flipped(self) -> Self {
        match self {
            JoinKind::Left => JoinKind::Right,
            JoinKind::Right => JoinKind::Left,
            other => other,
        }
    }
}

/// Comparison operators a FILTER may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Gte,
    Lte,
    Contains,
    In,
    Between,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 9] = [
        FilterOperator::Equals,
        FilterOperator::NotEquals,
        FilterOperator::GreaterThan,
        FilterOperator::LessThan,
        FilterOperator::Gte,
        FilterOperator::Lte,
        FilterOperator::Contains,
        FilterOperator::In,
        FilterOperator::Between,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
            FilterOperator::Between => "between",
        }
    }

    /// Whether `n` values are acceptable for this operator.
    pub fn accepts_arity(&self, n: usize) -> bool {
        match self {
            FilterOperator::Between => n == 2,
            FilterOperator::In => n >= 1,
            _ => n == 1,
        }
    }

    pub fn expected_arity(&self) -> &'static str {
        match self {
            FilterOperator::Between => "exactly 2",
            FilterOperator::In => "at least 1",
            _ => "exactly 1",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOperator::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownOperator(s.to_string()))
    }
}

impl TryFrom<String> for FilterOperator {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Aggregate functions an AGGREGATE may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub const ALL: [AggregateFunction; 5] = [
        AggregateFunction::Count,
        AggregateFunction::Sum,
        AggregateFunction::Avg,
        AggregateFunction::Min,
        AggregateFunction::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "count",
            AggregateFunction::Sum => "sum",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
        }
    }

    /// SQL function name.
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateFunction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregateFunction::ALL
            .into_iter()
            .find(|func| func.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownFunction(s.to_string()))
    }
}

impl TryFrom<String> for AggregateFunction {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePayload {
    pub table: String,
    /// Preferred SQL alias, honored when it does not collide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPayload {
    pub column: ColumnRef,
    /// Output name in the SELECT list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub left_table: String,
    pub right_table: String,
    pub left_column: String,
    pub right_column: String,
    #[serde(default)]
    pub kind: JoinKind,
}

impl JoinPayload {
    pub fn left(&self) -> ColumnRef {
        ColumnRef::new(&self.left_table, &self.left_column)
    }

    pub fn right(&self) -> ColumnRef {
        ColumnRef::new(&self.right_table, &self.right_column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPayload {
    pub column: ColumnRef,
    pub operator: FilterOperator,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatePayload {
    pub function: AggregateFunction,
    pub column: ColumnRef,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupByPayload {
    pub columns: Vec<ColumnRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByPayload {
    pub column: ColumnRef,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitPayload {
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

/// Category-specific data of a component. The variant is the category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentPayload {
    Table(TablePayload),
    Column(ColumnPayload),
    Join(JoinPayload),
    Filter(FilterPayload),
    Aggregate(AggregatePayload),
    GroupBy(GroupByPayload),
    OrderBy(OrderByPayload),
    Limit(LimitPayload),
}

impl ComponentPayload {
    pub fn category(&self) -> Category {
        match self {
            ComponentPayload::Table(_) => Category::Table,
            ComponentPayload::Column(_) => Category::Column,
            ComponentPayload::Join(_) => Category::Join,
            ComponentPayload::Filter(_) => Category::Filter,
            ComponentPayload::Aggregate(_) => Category::Aggregate,
            ComponentPayload::GroupBy(_) => Category::GroupBy,
            ComponentPayload::OrderBy(_) => Category::OrderBy,
            ComponentPayload::Limit(_) => Category::Limit,
        }
    }
}

// =============================================================================
// Component
// =============================================================================

/// A registered query fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DslComponent {
    #[serde(default, skip_serializing_if = "ComponentId::is_empty")]
    pub id: ComponentId,
    pub description: String,
    #[serde(flatten)]
    pub payload: ComponentPayload,
}

impl DslComponent {
    pub fn new(
        id: impl Into<ComponentId>,
        description: impl Into<String>,
        payload: ComponentPayload,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            payload,
        }
    }

    /// Build a component whose id is derived from its content.
    pub fn derived(description: impl Into<String>, payload: ComponentPayload) -> Self {
        let mut component = Self::new(ComponentId::default(), description, payload);
        component.id = component.content_id();
        component
    }

    pub fn category(&self) -> Category {
        self.payload.category()
    }

    /// The text handed to the embedding gateway.
    pub fn embedding_text(&self) -> &str {
        self.description.trim()
    }

    /// Logical table names this component depends on, in payload order.
    pub fn referenced_tables(&self) -> Vec<&str> {
        match &self.payload {
            ComponentPayload::Table(t) => vec![t.table.as_str()],
            ComponentPayload::Column(c) => vec![c.column.table.as_str()],
            ComponentPayload::Join(j) => vec![j.left_table.as_str(), j.right_table.as_str()],
            ComponentPayload::Filter(f) => vec![f.column.table.as_str()],
            ComponentPayload::Aggregate(a) => vec![a.column.table.as_str()],
            ComponentPayload::GroupBy(g) => {
                let mut tables: Vec<&str> = Vec::new();
                for c in &g.columns {
                    if !tables.contains(&c.table.as_str()) {
                        tables.push(c.table.as_str());
                    }
                }
                tables
            }
            ComponentPayload::OrderBy(o) => vec![o.column.table.as_str()],
            ComponentPayload::Limit(_) => vec![],
        }
    }

    /// Deterministic id from category, description and payload.
    ///
    /// Loading the same definition twice yields the same id.
    pub fn content_id(&self) -> ComponentId {
        let mut hasher = Sha256::new();
        hasher.update(self.category().as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.embedding_text().as_bytes());
        hasher.update([0u8]);
        // Serializing a payload of plain data cannot fail
        let payload = serde_json::to_vec(&self.payload).unwrap_or_default();
        hasher.update(&payload);
        let digest = hasher.finalize();
        let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
        ComponentId(format!("{}-{}", self.category().as_str().to_lowercase(), hex))
    }

    /// Parse one component from JSON, surfacing shape errors as validation errors.
    pub fn from_json(value: serde_json::Value) -> ValidationResult<Self> {
        let mut component: DslComponent = serde_json::from_value(value)
            .map_err(|e| classify_parse_error(e.to_string()))?;
        if component.id.is_empty() {
            component.id = component.content_id();
        }
        Ok(component)
    }
}

/// Map a serde message back onto the closed-set errors it came from.
fn classify_parse_error(message: String) -> ValidationError {
    if let Some(rest) = message.strip_prefix("unknown filter operator: ") {
        return ValidationError::UnknownOperator(trim_serde_suffix(rest));
    }
    if let Some(rest) = message.strip_prefix("unknown aggregate function: ") {
        return ValidationError::UnknownFunction(trim_serde_suffix(rest));
    }
    if message.starts_with("unknown variant") && message.contains("TABLE") {
        return ValidationError::UnknownCategory(message);
    }
    ValidationError::Malformed(message)
}

fn trim_serde_suffix(s: &str) -> String {
    // serde_json appends " at line N column M" for positioned errors
    match s.find(" at line ") {
        Some(idx) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
