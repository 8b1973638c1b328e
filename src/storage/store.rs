/**
 * Content Store
 *
 * Durable path-addressed storage of file records over SQLite. The store
 * is the system of record the mirror reconciles from: after every
 * successful save or collaborative edit, store and mirror hold the same
 * content.
 *
 * # Schema
 *
 * A single `files` table, created idempotently at startup:
 *
 * - `id` - opaque record key (UUID, stored as text)
 * - `path` - normalized user-rooted relative path, unique
 * - `name` - final path segment
 * - `content` - current text content
 * - `updated_at` - last write timestamp
 *
 * Records are created on first save and mutated on every accepted write.
 * Deletion is an external collaborator concern; nothing here deletes.
 */

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

/// A stored file's identity and current content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Opaque store key
    pub id: Uuid,
    /// Normalized user-rooted relative path (canonical identity)
    pub path: String,
    /// Final path segment
    pub name: String,
    /// Current content
    pub content: String,
    /// Timestamp of the last accepted write
    pub updated_at: DateTime<Utc>,
}

/// Final segment of a relative path, used as the record name
pub fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Path-addressed file storage over a SQLite pool
#[derive(Debug, Clone)]
pub struct ContentStore {
    pool: SqlitePool,
}

impl ContentStore {
    /// Connect to the database at `url` and ensure the schema exists
    ///
    /// Tests use `sqlite::memory:`; the server default is an on-disk
    /// database created on first run (`mode=rwc`).
    pub async fn connect(url: &str) -> Result<Self, SyncError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool, ensuring the schema exists
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, SyncError> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Idempotently create the `files` table
    async fn ensure_schema(&self) -> Result<(), SyncError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                content TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Look up a record by its canonical path
    ///
    /// Returns `None` when the store has never seen the path; the caller
    /// decides whether that is the bootstrap case or an error.
    pub async fn find_by_path(&self, path: &str) -> Result<Option<FileRecord>, SyncError> {
        let row = sqlx::query(
            "SELECT id, path, name, content, updated_at FROM files WHERE path = ?1",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    /// Upsert a record's content, returning the fresh record
    ///
    /// Creates the record on first write. `updated_at` is set to the
    /// moment of the write.
    pub async fn write(&self, path: &str, content: &str) -> Result<FileRecord, SyncError> {
        let record = FileRecord {
            id: Uuid::new_v4(),
            path: path.to_string(),
            name: file_name(path),
            content: content.to_string(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO files (id, path, name, content, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (path) DO UPDATE SET
                content = excluded.content,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.path)
        .bind(&record.name)
        .bind(&record.content)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        // The upsert keeps the original id on conflict; read the row back
        // so the returned record reflects what is actually stored.
        self.find_by_path(path)
            .await?
            .ok_or_else(|| SyncError::not_found(path))
    }
}

fn record_from_row(row: sqlx::sqlite::SqliteRow) -> Result<FileRecord, SyncError> {
    let id: String = row.try_get("id")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(FileRecord {
        id: Uuid::parse_str(&id)
            .map_err(|e| SyncError::invalid_identity(format!("malformed record id: {e}")))?,
        path: row.try_get("path")?,
        name: row.try_get("name")?,
        content: row.try_get("content")?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| SyncError::invalid_identity(format!("malformed timestamp: {e}")))?
            .with_timezone(&Utc),
    })
}
