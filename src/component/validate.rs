//! Structural validation of a single component.

use std::collections::BTreeSet;

use super::error::{ValidationError, ValidationResult};
use super::{Category, ColumnRef, ComponentPayload, DslComponent};

/// Check a component against the set of registered table names.
///
/// A TABLE component is checked in isolation; every other payload must only
/// reference tables in `known_tables`.
pub fn validate(component: &DslComponent, known_tables: &BTreeSet<String>) -> ValidationResult<()> {
    let category = component.category();
    let check = Checker {
        component,
        category,
        known_tables,
    };

    if component.id.is_empty() {
        return Err(check.empty("id"));
    }
    if component.embedding_text().is_empty() {
        return Err(check.empty("description"));
    }

    match &component.payload {
        ComponentPayload::Table(t) => {
            check.non_empty(&t.table, "table")?;
            if let Some(alias) = &t.alias {
                check.non_empty(alias, "alias")?;
            }
        }
        ComponentPayload::Column(c) => {
            check.column(&c.column, "column")?;
            if let Some(alias) = &c.alias {
                check.non_empty(alias, "alias")?;
            }
        }
        ComponentPayload::Join(j) => {
            check.non_empty(&j.left_table, "left_table")?;
            check.non_empty(&j.right_table, "right_table")?;
            check.non_empty(&j.left_column, "left_column")?;
            check.non_empty(&j.right_column, "right_column")?;
            if j.left_table == j.right_table {
                return Err(ValidationError::SelfJoin {
                    id: component.id.clone(),
                    table: j.left_table.clone(),
                });
            }
            check.known(&j.left_table)?;
            check.known(&j.right_table)?;
        }
        ComponentPayload::Filter(f) => {
            check.column(&f.column, "column")?;
            if !f.operator.accepts_arity(f.values.len()) {
                return Err(ValidationError::ValueArity {
                    id: component.id.clone(),
                    operator: f.operator,
                    expected: f.operator.expected_arity(),
                    actual: f.values.len(),
                });
            }
        }
        ComponentPayload::Aggregate(a) => {
            check.column(&a.column, "column")?;
            check.non_empty(&a.alias, "alias")?;
        }
        ComponentPayload::GroupBy(g) => {
            if g.columns.is_empty() {
                return Err(check.empty("columns"));
            }
            for c in &g.columns {
                check.column(c, "columns")?;
            }
        }
        ComponentPayload::OrderBy(o) => {
            check.column(&o.column, "column")?;
        }
        ComponentPayload::Limit(l) => {
            if l.limit == 0 {
                return Err(ValidationError::ZeroLimit {
                    id: component.id.clone(),
                });
            }
            let counts = [("limit", Some(l.limit)), ("offset", l.offset)];
            for (field, value) in counts {
                if let Some(value) = value.filter(|v| i64::try_from(*v).is_err()) {
                    return Err(ValidationError::LimitOutOfRange {
                        id: component.id.clone(),
                        field,
                        value,
                    });
                }
            }
        }
    }

    Ok(())
}

struct Checker<'a> {
    component: &'a DslComponent,
    category: Category,
    known_tables: &'a BTreeSet<String>,
}

impl Checker<'_> {
    fn empty(&self, field: &'static str) -> ValidationError {
        ValidationError::EmptyField {
            id: self.component.id.clone(),
            category: self.category,
            field,
        }
    }

    fn non_empty(&self, value: &str, field: &'static str) -> ValidationResult<()> {
        if value.trim().is_empty() {
            Err(self.empty(field))
        } else {
            Ok(())
        }
    }

    fn known(&self, table: &str) -> ValidationResult<()> {
        if self.known_tables.contains(table) {
            Ok(())
        } else {
            Err(ValidationError::UnknownTable {
                id: self.component.id.clone(),
                category: self.category,
                table: table.to_string(),
            })
        }
    }

    fn column(&self, column: &ColumnRef, field: &'static str) -> ValidationResult<()> {
        self.non_empty(&column.table, field)?;
        self.non_empty(&column.column, field)?;
        self.known(&column.table)
    }
}
