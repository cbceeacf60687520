//! Bulk loading of components.
//!
//! Two sources are supported:
//!
//! - a JSON array of component definitions, as written by hand or exported
//!   from another catalogue ([`load_components`]);
//! - a declarative schema description from which TABLE, COLUMN, JOIN,
//!   AGGREGATE and GROUP_BY components are derived with templated
//!   descriptions ([`seed_from_schema`]).
//!
//! Seeded components get content-derived ids, so seeding the same schema
//! twice produces the same catalogue.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use inflector::Inflector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    AggregateFunction, AggregatePayload, ColumnPayload, ColumnRef, ComponentPayload, DslComponent,
    GroupByPayload, JoinKind, JoinPayload, TablePayload, ValidationError,
};

pub type LoaderResult<T> = Result<T, LoaderError>;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("component file must contain a JSON array")]
    NotAnArray,

    #[error("component #{index}: {source}")]
    Component {
        index: usize,
        #[source]
        source: ValidationError,
    },
}

/// Read a JSON array of components.
pub fn load_components(path: impl AsRef<Path>) -> LoaderResult<Vec<DslComponent>> {
    let content = read(path.as_ref())?;
    parse_components(&content)
}

/// Parse a JSON array of components. Missing ids are derived from content.
pub fn parse_components(json: &str) -> LoaderResult<Vec<DslComponent>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let serde_json::Value::Array(items) = value else {
        return Err(LoaderError::NotAnArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            DslComponent::from_json(item).map_err(|source| LoaderError::Component { index, source })
        })
        .collect()
}

fn read(path: &Path) -> LoaderResult<String> {
    fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// Schema description
// =============================================================================

/// Tables, columns and relationships to seed a catalogue from.
///
/// ```toml
/// [[tables]]
/// name = "sales"
/// alias = "s"
/// columns = [
///     { name = "id" },
///     { name = "region" },
///     { name = "amount", numeric = true },
///     { name = "customer_id" },
/// ]
/// foreign_keys = [
///     { column = "customer_id", references_table = "customers" },
/// ]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescription {
    #[serde(default)]
    pub tables: Vec<TableDescription>,

    /// Also join `<singular table>_id` columns to that table's `id`.
    #[serde(default)]
    pub infer_foreign_keys: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    /// Extra natural-language description, registered alongside the templates.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDescription>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Numeric columns get aggregate components.
    #[serde(default)]
    pub numeric: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    #[serde(default = "default_key_column")]
    pub references_column: String,
    #[serde(default)]
    pub kind: JoinKind,
}

fn default_key_column() -> String {
    "id".to_string()
}

impl SchemaDescription {
    /// Load from a `.toml` or `.json` file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> LoaderResult<Self> {
        let path = path.as_ref();
        let content = read(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            _ => Ok(toml::from_str(&content)?),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableDescription> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl TableDescription {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

// =============================================================================
// Seeding
// =============================================================================

const AGGREGATES: [(AggregateFunction, &str, &str); 5] = [
    (AggregateFunction::Count, "count", "number of"),
    (AggregateFunction::Sum, "sum", "total"),
    (AggregateFunction::Avg, "average", "mean"),
    (AggregateFunction::Min, "minimum", "lowest"),
    (AggregateFunction::Max, "maximum", "highest"),
];

/// Derive catalogue components from a schema description.
///
/// Every table, column and relationship gets several phrasings so that
/// differently worded questions still land near one of them.
pub fn seed_from_schema(schema: &SchemaDescription) -> Vec<DslComponent> {
    let mut seeder = Seeder::default();

    for table in &schema.tables {
        let payload = ComponentPayload::Table(TablePayload {
            table: table.name.clone(),
            alias: table.alias.clone(),
        });
        let t = natural(&table.name);
        let mut phrases = vec![
            format!("table {}", t),
            format!("data from {}", t),
            format!("{} records", t),
        ];
        phrases.extend(table.description.clone());
        seeder.add_all(phrases, &payload);
    }

    for table in &schema.tables {
        let t = natural(&table.name);
        for column in &table.columns {
            let c = natural(&column.name);
            let payload = ComponentPayload::Column(ColumnPayload {
                column: ColumnRef::new(&table.name, &column.name),
                alias: None,
            });
            let mut phrases = vec![format!("{} in {}", c, t), format!("{} from {}", c, t)];
            phrases.extend(column.description.clone());
            seeder.add_all(phrases, &payload);

            if column.numeric {
                for (function, name, alt) in AGGREGATES {
                    let payload = ComponentPayload::Aggregate(AggregatePayload {
                        function,
                        column: ColumnRef::new(&table.name, &column.name),
                        alias: format!("{}_{}", function.as_str(), column.name),
                    });
                    seeder.add_all(
                        vec![
                            format!("{} of {} in {}", name, c, t),
                            format!("{} {} for {}", alt, c, t),
                        ],
                        &payload,
                    );
                }
            } else if !is_key_column(&column.name) {
                let payload = ComponentPayload::GroupBy(GroupByPayload {
                    columns: vec![ColumnRef::new(&table.name, &column.name)],
                });
                seeder.add_all(
                    vec![
                        format!("group by {} in {}", c, t),
                        format!("{} by {}", t, c),
                    ],
                    &payload,
                );
            }
        }
    }

    for join in relationships(schema) {
        let (a, b) = (natural(&join.left_table), natural(&join.right_table));
        seeder.add_all(
            vec![
                format!("join {} with {}", a, b),
                format!("connect {} to {}", a, b),
                format!("link {} and {}", a, b),
            ],
            &ComponentPayload::Join(join),
        );
    }

    tracing::debug!(components = seeder.out.len(), "loader.seed.done");
    seeder.out
}

/// Declared foreign keys, plus inferred ones when enabled.
fn relationships(schema: &SchemaDescription) -> Vec<JoinPayload> {
    let mut joins: Vec<JoinPayload> = Vec::new();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

    for table in &schema.tables {
        for fk in &table.foreign_keys {
            if fk.references_table == table.name {
                continue;
            }
            seen.insert((table.name.clone(), fk.column.clone()));
            joins.push(JoinPayload {
                left_table: table.name.clone(),
                right_table: fk.references_table.clone(),
                left_column: fk.column.clone(),
                right_column: fk.references_column.clone(),
                kind: fk.kind,
            });
        }
    }

    if !schema.infer_foreign_keys {
        return joins;
    }

    for table in &schema.tables {
        for column in &table.columns {
            let Some(stem) = column.name.strip_suffix("_id") else {
                continue;
            };
            if seen.contains(&(table.name.clone(), column.name.clone())) {
                continue;
            }
            let target = schema.tables.iter().find(|t| {
                t.name != table.name && t.name.to_singular() == stem.to_singular() && t.has_column("id")
            });
            if let Some(target) = target {
                tracing::debug!(
                    table = %table.name,
                    column = %column.name,
                    references = %target.name,
                    "loader.seed.inferred_join"
                );
                joins.push(JoinPayload {
                    left_table: table.name.clone(),
                    right_table: target.name.clone(),
                    left_column: column.name.clone(),
                    right_column: "id".to_string(),
                    kind: JoinKind::Inner,
                });
            }
        }
    }

    joins
}

fn is_key_column(name: &str) -> bool {
    name == "id" || name.ends_with("_id")
}

/// `order_items` / `orderItems` -> `order items`.
fn natural(name: &str) -> String {
    name.to_sentence_case().to_lowercase()
}

#[derive(Default)]
struct Seeder {
    out: Vec<DslComponent>,
    seen: BTreeSet<String>,
}

impl Seeder {
    fn add_all(&mut self, phrases: Vec<String>, payload: &ComponentPayload) {
        for phrase in phrases {
            let phrase = phrase.trim();
            if phrase.is_empty() {
                continue;
            }
            let component = DslComponent::derived(phrase, payload.clone());
            if self.seen.insert(component.id.to_string()) {
                self.out.push(component);
            }
        }
    }
}
