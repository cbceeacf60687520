//! Component validation errors.

use thiserror::Error;

use super::{Category, ComponentId, FilterOperator};

/// Reasons a component definition is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is empty or whitespace.
    #[error("{category} component `{id}`: required field `{field}` is empty")]
    EmptyField {
        id: ComponentId,
        category: Category,
        field: &'static str,
    },

    #[error("unknown filter operator: {0}")]
    UnknownOperator(String),

    #[error("unknown aggregate function: {0}")]
    UnknownFunction(String),

    #[error("unknown component category: {0}")]
    UnknownCategory(String),

    #[error("FILTER component `{id}`: operator `{operator}` takes {expected} value(s), got {actual}")]
    ValueArity {
        id: ComponentId,
        operator: FilterOperator,
        expected: &'static str,
        actual: usize,
    },

    /// The payload names a table that has no registered TABLE component.
    #[error("{category} component `{id}` references unregistered table `{table}`")]
    UnknownTable {
        id: ComponentId,
        category: Category,
        table: String,
    },

    #[error("JOIN component `{id}` joins table `{table}` to itself")]
    SelfJoin { id: ComponentId, table: String },

    #[error("LIMIT component `{id}`: limit must be positive")]
    ZeroLimit { id: ComponentId },

    #[error("LIMIT component `{id}`: {field} {value} exceeds the largest row count SQL can express")]
    LimitOutOfRange {
        id: ComponentId,
        field: &'static str,
        value: u64,
    },

    /// Registered components cannot be redefined in place.
    #[error("component `{id}` is already registered with a different definition")]
    Immutable { id: ComponentId },

    /// JSON that does not describe a component at all.
    #[error("malformed component definition: {0}")]
    Malformed(String),
}

pub type ValidationResult<T> = Result<T, ValidationError>;
