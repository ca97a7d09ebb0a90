//! SQLite-backed storage engine.
//!
//! One [`Store`] instance owns the index directory and the connection pool,
//! and keeps three projections of the corpus in sync inside a single
//! database: the `entities` rows, the `entities_fts` FTS5 mirror for
//! lexical search, and the `entity_vectors` BLOB table for semantic search.
//! All three are written in one transaction per entity, so a reader never
//! observes a partially indexed entity.
//!
//! Lifecycle: [`Store::initialize`] must succeed before any data access;
//! until then every other call fails with [`Error::NotInitialized`].
//! `initialize` is idempotent — a second call on an open store is a no-op,
//! and re-opening an existing index directory preserves its contents.

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::debug;

use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::CodeEntity;

/// Storage engine over a single index directory.
pub struct Store {
    path: PathBuf,
    pool: RwLock<Option<SqlitePool>>,
}

impl Store {
    /// Create a handle for the index at `path`. No I/O happens until
    /// [`initialize`](Store::initialize).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Store {
            path: path.into(),
            pool: RwLock::new(None),
        }
    }

    /// The index directory this store was constructed with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open or create the backing store and provision the schema.
    ///
    /// Idempotent: the first call creates the directory, database file,
    /// and tables; subsequent calls on the same location open the existing
    /// data without loss, and calls on an already-open store return
    /// immediately. Fails with [`Error::Connection`] when the store cannot
    /// be opened or created — never swallowed.
    pub async fn initialize(&self) -> Result<()> {
        let mut guard = self.pool.write().await;
        if guard.is_some() {
            return Ok(());
        }

        let pool = db::connect(&self.path).await?;
        provision_schema(&pool)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        debug!(path = %self.path.display(), "index store initialized");
        *guard = Some(pool);
        Ok(())
    }

    /// Release all resources. Safe to call once per successful initialize;
    /// a close on a never-initialized store is a no-op.
    pub async fn close(&self) {
        let pool = self.pool.write().await.take();
        if let Some(pool) = pool {
            pool.close().await;
        }
    }

    /// Clone out a pool handle, or fail if `initialize` has not succeeded.
    pub(crate) async fn pool(&self) -> Result<SqlitePool> {
        self.pool
            .read()
            .await
            .clone()
            .ok_or(Error::NotInitialized)
    }

    /// Point lookup by id. Unknown ids return `Ok(None)`, never an error.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<CodeEntity>> {
        let pool = self.pool().await?;

        let row = sqlx::query(
            r#"
            SELECT e.id, e.name, e.fqn, e.kind, e.content, e.signature, e.file,
                   e.line_start, e.line_end, e.language,
                   e.parameters, e.returns, e.extends, e.implements, e.calls,
                   e.api_endpoints, e.db_tables,
                   v.embedding
            FROM entities e
            LEFT JOIN entity_vectors v ON v.entity_id = e.id
            WHERE e.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&pool)
        .await?;

        row.map(|r| entity_from_row(&r)).transpose()
    }

    /// Insert or fully replace one entity (row + FTS mirror + vector) in a
    /// single transaction. Last write wins on id collision.
    pub(crate) async fn upsert(&self, entity: &CodeEntity) -> Result<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        write_entity(&mut tx, entity).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Insert or replace a batch of already-validated entities in one
    /// transaction.
    pub(crate) async fn upsert_batch(&self, entities: &[CodeEntity]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        for entity in entities {
            write_entity(&mut tx, entity).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Number of entities in the corpus.
    pub async fn count_rows(&self) -> Result<i64> {
        let pool = self.pool().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities")
            .fetch_one(&pool)
            .await?;
        Ok(count)
    }

    /// Approximate on-disk footprint of the index in bytes (database file
    /// plus WAL).
    pub async fn estimated_size(&self) -> Result<u64> {
        // Require initialization like every other data-access call.
        self.pool().await?;

        let db_path = self.path.join(db::DB_FILE);
        let mut size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
        for suffix in ["-wal", "-shm"] {
            let side = db_path.with_file_name(format!("{}{}", db::DB_FILE, suffix));
            size += std::fs::metadata(side).map(|m| m.len()).unwrap_or(0);
        }
        Ok(size)
    }
}

/// Create tables and indexes. All statements are idempotent; the FTS5
/// virtual table needs an existence check since its CREATE is not.
async fn provision_schema(pool: &SqlitePool) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            fqn TEXT NOT NULL,
            kind TEXT NOT NULL,
            content TEXT NOT NULL,
            signature TEXT NOT NULL DEFAULT '',
            file TEXT NOT NULL,
            line_start INTEGER NOT NULL,
            line_end INTEGER NOT NULL,
            language TEXT NOT NULL DEFAULT 'unknown',
            parameters TEXT,
            returns TEXT,
            extends TEXT,
            implements TEXT,
            calls TEXT,
            api_endpoints TEXT,
            db_tables TEXT,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entity_vectors (
            entity_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            FOREIGN KEY (entity_id) REFERENCES entities(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so check first. The
    // unicode61 separators make code identifiers like `user_session` and
    // paths like `/api/users/{id}` tokenize into their parts.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='entities_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE entities_fts USING fts5(
                entity_id UNINDEXED,
                name,
                signature,
                content,
                api_endpoints,
                db_tables,
                tokenize = "unicode61 separators '_::->./'"
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_language ON entities(language)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_file ON entities(file)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Write one entity's row, FTS mirror, and vector inside `tx`.
async fn write_entity(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    entity: &CodeEntity,
) -> std::result::Result<(), sqlx::Error> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO entities (id, name, fqn, kind, content, signature, file,
                              line_start, line_end, language,
                              parameters, returns, extends, implements, calls,
                              api_endpoints, db_tables, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            fqn = excluded.fqn,
            kind = excluded.kind,
            content = excluded.content,
            signature = excluded.signature,
            file = excluded.file,
            line_start = excluded.line_start,
            line_end = excluded.line_end,
            language = excluded.language,
            parameters = excluded.parameters,
            returns = excluded.returns,
            extends = excluded.extends,
            implements = excluded.implements,
            calls = excluded.calls,
            api_endpoints = excluded.api_endpoints,
            db_tables = excluded.db_tables,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&entity.id)
    .bind(&entity.name)
    .bind(&entity.fqn)
    .bind(entity.kind.as_str())
    .bind(&entity.content)
    .bind(&entity.signature)
    .bind(&entity.file)
    .bind(entity.line_start)
    .bind(entity.line_end)
    .bind(entity.language.as_str())
    .bind(to_json_column(&entity.parameters))
    .bind(to_json_column(&entity.returns))
    .bind(to_json_column(&entity.extends))
    .bind(to_json_column(&entity.implements))
    .bind(to_json_column(&entity.calls))
    .bind(to_json_column(&entity.api_endpoints))
    .bind(to_json_column(&entity.db_tables))
    .bind(now)
    .execute(&mut **tx)
    .await?;

    // Replace the FTS mirror row. Correlation keys are indexed space-joined
    // so `/api/users/{id}` matches a search for its path segments.
    sqlx::query("DELETE FROM entities_fts WHERE entity_id = ?")
        .bind(&entity.id)
        .execute(&mut **tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO entities_fts (entity_id, name, signature, content, api_endpoints, db_tables)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entity.id)
    .bind(&entity.name)
    .bind(&entity.signature)
    .bind(&entity.content)
    .bind(entity.api_endpoints.as_deref().unwrap_or(&[]).join(" "))
    .bind(entity.db_tables.as_deref().unwrap_or(&[]).join(" "))
    .execute(&mut **tx)
    .await?;

    if let Some(ref vector) = entity.embedding {
        let blob = vec_to_blob(vector);
        sqlx::query(
            r#"
            INSERT INTO entity_vectors (entity_id, embedding, dims)
            VALUES (?, ?, ?)
            ON CONFLICT(entity_id) DO UPDATE SET
                embedding = excluded.embedding,
                dims = excluded.dims
            "#,
        )
        .bind(&entity.id)
        .bind(&blob)
        .bind(vector.len() as i64)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

fn to_json_column<T: serde::Serialize>(value: &Option<T>) -> Option<String> {
    value
        .as_ref()
        .and_then(|v| serde_json::to_string(v).ok())
}

fn from_json_column<T: serde::de::DeserializeOwned>(value: Option<String>) -> Option<T> {
    value.and_then(|s| serde_json::from_str(&s).ok())
}

/// Assemble a [`CodeEntity`] from a joined entities/entity_vectors row.
pub(crate) fn entity_from_row(row: &SqliteRow) -> Result<CodeEntity> {
    let kind: String = row.try_get("kind")?;
    let language: String = row.try_get("language")?;
    let embedding: Option<Vec<u8>> = row.try_get("embedding")?;

    Ok(CodeEntity {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        fqn: row.try_get("fqn")?,
        kind: crate::models::EntityKind::parse(&kind),
        content: row.try_get("content")?,
        signature: row.try_get("signature")?,
        file: row.try_get("file")?,
        line_start: row.try_get("line_start")?,
        line_end: row.try_get("line_end")?,
        language: crate::models::Language::parse(&language),
        parameters: from_json_column(row.try_get("parameters")?),
        returns: from_json_column(row.try_get("returns")?),
        extends: from_json_column(row.try_get("extends")?),
        implements: from_json_column(row.try_get("implements")?),
        calls: from_json_column(row.try_get("calls")?),
        api_endpoints: from_json_column(row.try_get("api_endpoints")?),
        db_tables: from_json_column(row.try_get("db_tables")?),
        embedding: embedding.map(|blob| blob_to_vec(&blob)),
    })
}
