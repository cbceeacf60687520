//! Registration against the SQLite catalogue: seeding, idempotency and
//! immutability.

use std::sync::Arc;

use nlsql::component::{
    load_components, seed_from_schema, Category, ColumnRef, ComponentPayload, ComponentRegistry,
    DslComponent, FilterOperator, FilterPayload, RegisterOutcome, RegistryError,
    SchemaDescription, TablePayload, ValidationError, Value,
};
use nlsql::embedding::HashingEmbedder;
use nlsql::store::{SqliteVectorStore, VectorStore};

const SCHEMA: &str = r#"
infer_foreign_keys = true

[[tables]]
name = "sales"
alias = "s"
columns = [
    { name = "id" },
    { name = "region" },
    { name = "amount", numeric = true },
    { name = "customer_id" },
]

[[tables]]
name = "customers"
columns = [{ name = "id" }, { name = "segment" }]
"#;

fn registry() -> (ComponentRegistry, Arc<SqliteVectorStore>) {
    let store = Arc::new(SqliteVectorStore::open_in_memory().unwrap());
    let registry = ComponentRegistry::new(Arc::new(HashingEmbedder::new(64)), store.clone());
    (registry, store)
}

fn sales_table() -> DslComponent {
    DslComponent::new(
        "t-sales",
        "sales transactions",
        ComponentPayload::Table(TablePayload {
            table: "sales".into(),
            alias: None,
        }),
    )
}

fn west_filter(value: &str) -> DslComponent {
    DslComponent::new(
        "f-west",
        "west region",
        ComponentPayload::Filter(FilterPayload {
            column: ColumnRef::new("sales", "region"),
            operator: FilterOperator::Equals,
            values: vec![Value::from(value)],
        }),
    )
}

#[tokio::test]
async fn test_seeded_schema_registers_once() {
    let (registry, store) = registry();
    let schema: SchemaDescription = toml::from_str(SCHEMA).unwrap();
    let seeded = seed_from_schema(&schema);

    let first = registry.register_all(seeded.clone()).await.unwrap();
    assert_eq!(first.registered, seeded.len());
    assert_eq!(first.unchanged, 0);

    let second = registry.register_all(seeded.clone()).await.unwrap();
    assert_eq!(second.registered, 0);
    assert_eq!(second.unchanged, seeded.len());

    assert_eq!(store.list(None).await.unwrap().len(), seeded.len());
    let joins = store.list(Some(Category::Join)).await.unwrap();
    assert!(!joins.is_empty());
    assert!(joins.iter().all(|j| matches!(
        &j.payload,
        ComponentPayload::Join(p) if p.left_column == "customer_id" && p.right_table == "customers"
    )));
}

#[tokio::test]
async fn test_redefinition_under_same_id_is_rejected() {
    let (registry, store) = registry();
    registry.register(sales_table()).await.unwrap();
    assert_eq!(
        registry.register(west_filter("west")).await.unwrap(),
        RegisterOutcome::Registered
    );
    assert_eq!(
        registry.register(west_filter("west")).await.unwrap(),
        RegisterOutcome::Unchanged
    );

    let err = registry.register(west_filter("east")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Validation(ValidationError::Immutable { .. })
    ));

    // The original definition is untouched
    let stored = store.fetch(&["f-west".into()]).await.unwrap();
    assert_eq!(stored, vec![west_filter("west")]);
}

#[tokio::test]
async fn test_fragment_for_unregistered_table_rejected() {
    let (registry, store) = registry();
    let err = registry.register(west_filter("west")).await.unwrap_err();

    assert!(matches!(
        err,
        RegistryError::Validation(ValidationError::UnknownTable { ref table, .. }) if table == "sales"
    ));
    assert!(store.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deregister_frees_the_id() {
    let (registry, _store) = registry();
    registry.register(sales_table()).await.unwrap();
    registry.register(west_filter("west")).await.unwrap();

    assert!(registry.deregister(&"f-west".into()).await.unwrap());
    assert!(!registry.deregister(&"f-west".into()).await.unwrap());
    assert_eq!(
        registry.register(west_filter("east")).await.unwrap(),
        RegisterOutcome::Registered
    );
}

#[tokio::test]
async fn test_components_loaded_from_file() {
    let dir = std::env::temp_dir().join(format!("nlsql-registry-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("components.json");
    std::fs::write(
        &path,
        r#"[
            {"description": "sales region", "category": "COLUMN",
             "column": {"table": "sales", "column": "region"}},
            {"id": "t-sales", "description": "sales transactions", "category": "TABLE",
             "table": "sales"}
        ]"#,
    )
    .unwrap();

    let components = load_components(&path).unwrap();
    let (registry, _store) = registry();
    // The COLUMN is listed first but registers after its table
    let summary = registry.register_all(components).await.unwrap();
    assert_eq!(summary.registered, 2);
    assert_eq!(
        registry.known_tables().await.unwrap().into_iter().collect::<Vec<_>>(),
        vec!["sales".to_string()]
    );

    let _ = std::fs::remove_dir_all(&dir);
}
