//! Table alias assignment.

use std::collections::BTreeSet;

use serde::Serialize;

use super::TableBinding;

/// Maps logical table names to SQL aliases, in the order tables entered the plan.
///
/// Aliases are derived from the first letter of the table name and made
/// unique with a numeric suffix starting at 2: `sales` -> `s`,
/// `shipments` -> `s2`, `stores` -> `s3`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AliasRegistry {
    bindings: Vec<TableBinding>,
    #[serde(skip)]
    used: BTreeSet<String>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `table` and return its alias. Binding a table twice returns the first alias.
    ///
    /// `preferred` is used as-is when no other table holds it yet.
    pub fn assign(&mut self, table: &str, preferred: Option<&str>) -> String {
        if let Some(alias) = self.get(table) {
            return alias.to_string();
        }

        let alias = match preferred.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) if !self.is_used(p) => p.to_string(),
            _ => self.next_free(&base_letter(table)),
        };

        self.used.insert(alias.to_ascii_lowercase());
        self.bindings.push(TableBinding {
            table: table.to_string(),
            alias: alias.clone(),
        });
        alias
    }

    pub fn get(&self, table: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.table == table)
            .map(|b| b.alias.as_str())
    }

    pub fn contains(&self, table: &str) -> bool {
        self.get(table).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn is_used(&self, alias: &str) -> bool {
        self.used.contains(&alias.to_ascii_lowercase())
    }

    fn next_free(&self, base: &str) -> String {
        if !self.is_used(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{}{}", base, n))
            .find(|candidate| !self.is_used(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

fn base_letter(table: &str) -> String {
    table
        .chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase().to_string())
        .unwrap_or_else(|| "t".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_letter_aliases() {
        let mut aliases = AliasRegistry::new();
        assert_eq!(aliases.assign("sales", None), "s");
        assert_eq!(aliases.assign("customers", None), "c");
    }

    #[test]
    fn test_collisions_get_numeric_suffix() {
        let mut aliases = AliasRegistry::new();
        assert_eq!(aliases.assign("sales", None), "s");
        assert_eq!(aliases.assign("shipments", None), "s2");
        assert_eq!(aliases.assign("stores", None), "s3");
    }

    #[test]
    fn test_rebinding_returns_existing_alias() {
        let mut aliases = AliasRegistry::new();
        aliases.assign("sales", None);
        assert_eq!(aliases.assign("sales", Some("x")), "s");
        assert_eq!(aliases.len(), 1);
    }

    #[test]
    fn test_preferred_alias_honored_when_free() {
        let mut aliases = AliasRegistry::new();
        assert_eq!(aliases.assign("sales", Some("sl")), "sl");
        assert_eq!(aliases.assign("stores", Some("SL")), "s");
    }

    #[test]
    fn test_non_alphabetic_prefix() {
        let mut aliases = AliasRegistry::new();
        assert_eq!(aliases.assign("_2024_sales", None), "s");
        assert_eq!(aliases.assign("42", None), "t");
    }

    #[test]
    fn test_iteration_keeps_insertion_order() {
        let mut aliases = AliasRegistry::new();
        aliases.assign("sales", None);
        aliases.assign("customers", None);
        aliases.assign("products", None);
        let tables: Vec<&str> = aliases.iter().map(|b| b.table.as_str()).collect();
        assert_eq!(tables, vec!["sales", "customers", "products"]);
    }
}
