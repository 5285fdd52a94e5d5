//! SQLite template store.
//!
//! One row per identity, template stored as the raw little-endian f64 blob.
//! Every operation opens its own connection, so concurrent readers never
//! wait on each other (WAL mode).

use chrono::Utc;
use likeness_core::{
    decode_template, encode_template, Identity, StorageError, Template, TemplateStore,
};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Listing entry for an enrolled identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledIdentity {
    pub name: String,
    pub dim: usize,
    pub created_at: String,
    pub updated_at: String,
}

pub struct SqliteTemplateStore {
    path: PathBuf,
}

impl SqliteTemplateStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(StorageError::new)?;
        }

        let store = Self { path };
        let conn = store.connect()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS identities (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              name TEXT NOT NULL UNIQUE,
              template BLOB NOT NULL,
              created_at TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(StorageError::new)?;

        tracing::info!(path = %store.path.display(), "template store opened");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path).map_err(StorageError::new)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(StorageError::new)?;
        Ok(conn)
    }

    /// Enrolled identities in enrollment order.
    pub fn list(&self) -> Result<Vec<EnrolledIdentity>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT name, length(template) / 8, created_at, updated_at
                 FROM identities ORDER BY id",
            )
            .map_err(StorageError::new)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EnrolledIdentity {
                    name: row.get(0)?,
                    dim: row.get::<_, i64>(1)? as usize,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })
            .map_err(StorageError::new)?;
        let identities = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(StorageError::new)?;
        Ok(identities)
    }
}

impl TemplateStore for SqliteTemplateStore {
    fn get_all(&self) -> Result<Vec<(Identity, Template)>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT name, template FROM identities ORDER BY id")
            .map_err(StorageError::new)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })
            .map_err(StorageError::new)?;

        let mut gallery = Vec::new();
        for row in rows {
            let (name, blob) = row.map_err(StorageError::new)?;
            let template = decode_template(&blob)
                .map_err(|e| StorageError::new(format!("corrupt template for {name:?}: {e}")))?;
            gallery.push((Identity::new(name), template));
        }
        Ok(gallery)
    }

    /// Last write wins; the row keeps its id and therefore its match order.
    fn put(&self, identity: &Identity, template: &Template) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO identities (name, template, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(name) DO UPDATE
               SET template = excluded.template, updated_at = excluded.updated_at",
            params![identity.name(), encode_template(template), now],
        )
        .map_err(StorageError::new)?;

        tracing::debug!(identity = %identity, dim = template.dim(), "template stored");
        Ok(())
    }

    fn remove(&self, identity: &Identity) -> Result<bool, StorageError> {
        let conn = self.connect()?;
        let removed = conn
            .execute(
                "DELETE FROM identities WHERE name = ?1",
                params![identity.name()],
            )
            .map_err(StorageError::new)?;
        Ok(removed > 0)
    }
}
