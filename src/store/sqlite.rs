//! SQLite-backed vector store.
//!
//! One row per component holding the serialized component, its embedding and
//! the text the embedding was computed from. Similarity search loads the
//! vectors of one category and scores them in process; catalogues of query
//! fragments stay small enough that an ANN index would not pay for itself.
//!
//! The database lives at `<data dir>/nlsql/catalog.db` unless a path is
//! configured. The schema is versioned; a version mismatch drops and
//! recreates the tables.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{top_k, EmbeddingRecord, SearchHit, StoreError, StoreResult, VectorStore};
use crate::component::{Category, ComponentId, DslComponent};

/// Current catalogue schema version. Bump this when the row format changes.
const SCHEMA_VERSION: i32 = 1;

/// Persistent [`VectorStore`] over a single SQLite file.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open or create the catalogue at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    /// Open an in-memory catalogue (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    /// Default location of the catalogue database.
    pub fn default_path() -> StoreResult<PathBuf> {
        let base = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
        Ok(base.join("nlsql").join("catalog.db"))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        let stored_version: Option<i32> = conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
                let s: String = row.get(0)?;
                Ok(s.parse().unwrap_or(0))
            })
            .optional()?;

        if stored_version.is_some_and(|v| v != SCHEMA_VERSION) {
            tracing::warn!(
                found = stored_version,
                expected = SCHEMA_VERSION,
                "store.sqlite.schema_reset"
            );
            conn.execute_batch("DROP TABLE IF EXISTS components;")?;
        }

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS components (
                id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                text TEXT NOT NULL,
                vector TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                component TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS components_category ON components (category);
            ",
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?)",
            params![SCHEMA_VERSION.to_string()],
        )?;

        Ok(())
    }

    fn stored_dimension(conn: &Connection) -> StoreResult<Option<usize>> {
        let dim: Option<i64> = conn
            .query_row("SELECT dimension FROM components LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(dim.map(|d| d as usize))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, record: EmbeddingRecord, component: DslComponent) -> StoreResult<()> {
        record.check_matches(&component)?;
        let conn = self.lock()?;

        if let Some(expected) = Self::stored_dimension(&conn)? {
            if expected != record.vector.len() {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: record.vector.len(),
                });
            }
        }

        conn.execute(
            "INSERT OR REPLACE INTO components (id, category, text, vector, dimension, component)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.id.as_str(),
                record.category.as_str(),
                record.text,
                serde_json::to_string(&record.vector)?,
                record.vector.len() as i64,
                serde_json::to_string(&component)?,
            ],
        )?;
        Ok(())
    }

    async fn delete(&self, id: &ComponentId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let rows = conn.execute("DELETE FROM components WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }

    async fn search(
        &self,
        vector: &[f32],
        category: Category,
        k: usize,
    ) -> StoreResult<Vec<SearchHit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, vector FROM components WHERE category = ?")?;
        let rows = stmt.query_map(params![category.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, vector_json) = row?;
            let stored: Vec<f32> = serde_json::from_str(&vector_json)?;
            hits.push(SearchHit {
                id: ComponentId::new(id),
                similarity: super::cosine_similarity(vector, &stored),
            });
        }
        Ok(top_k(hits, k))
    }

    async fn fetch(&self, ids: &[ComponentId]) -> StoreResult<Vec<DslComponent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT component FROM components WHERE id = ?")?;

        let mut components = Vec::with_capacity(ids.len());
        for id in ids {
            let json: Option<String> = stmt
                .query_row(params![id.as_str()], |row| row.get(0))
                .optional()?;
            if let Some(json) = json {
                components.push(serde_json::from_str(&json)?);
            }
        }
        Ok(components)
    }

    async fn list(&self, category: Option<Category>) -> StoreResult<Vec<DslComponent>> {
        let conn = self.lock()?;
        let jsons: Vec<String> = match category {
            Some(cat) => {
                let mut stmt = conn
                    .prepare("SELECT component FROM components WHERE category = ? ORDER BY id")?;
                let rows = stmt.query_map(params![cat.as_str()], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            }
            None => {
                let mut stmt = conn.prepare("SELECT component FROM components ORDER BY id")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<Result<_, _>>()?
            }
        };

        jsons
            .iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }
}
