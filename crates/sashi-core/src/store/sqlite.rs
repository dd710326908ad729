//! SQLite-backed cache store.

use super::traits::{CacheEntry, CacheStore};
use super::CacheNamespace;
use crate::error::{Result, SashiError};
use crate::http::{RequestIdentity, ResponseSnapshot};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Durable cache store over a single SQLite database.
///
/// One row per entry; the namespace column provides isolation. Thread-safe
/// via an internal mutex on the connection. The upsert makes each put an
/// atomic whole-entry replace.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and create if needed) the store at the given database path.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SashiError::Io {
                message: format!("Failed to create cache directory: {}", e),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| SashiError::CacheUnavailable {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        // WAL keeps readers unblocked during background revalidation writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| SashiError::CacheUnavailable {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| SashiError::CacheUnavailable {
                message: format!("Failed to open in-memory database: {}", e),
                source: Some(e),
            })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                namespace TEXT NOT NULL,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (namespace, method, url)
            );

            CREATE INDEX IF NOT EXISTS idx_snapshots_namespace
                ON snapshots(namespace);
            "#,
        )
        .map_err(|e| SashiError::CacheUnavailable {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| SashiError::CacheUnavailable {
            message: format!("Failed to lock cache database: {}", e),
            source: None,
        })
    }
}

impl CacheStore for SqliteStore {
    fn put(
        &self,
        namespace: &CacheNamespace,
        identity: &RequestIdentity,
        snapshot: &ResponseSnapshot,
    ) -> Result<()> {
        let headers = serde_json::to_string(&snapshot.headers)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO snapshots (namespace, method, url, status, headers, body, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(namespace, method, url) DO UPDATE SET
                status = ?4,
                headers = ?5,
                body = ?6,
                stored_at = ?7
            "#,
            params![
                namespace.name(),
                identity.method,
                identity.url,
                snapshot.status,
                headers,
                snapshot.body.as_ref(),
                now
            ],
        )
        .map_err(|e| SashiError::CacheUnavailable {
            message: format!("Failed to write cache entry: {}", e),
            source: Some(e),
        })?;

        debug!("Cached {} {} in {}", identity.method, identity.url, namespace);
        Ok(())
    }

    fn get(
        &self,
        namespace: &CacheNamespace,
        identity: &RequestIdentity,
    ) -> Result<Option<CacheEntry>> {
        let conn = self.lock()?;
        let row: Option<(u16, String, Vec<u8>, String)> = conn
            .query_row(
                r#"
                SELECT status, headers, body, stored_at
                FROM snapshots
                WHERE namespace = ?1 AND method = ?2 AND url = ?3
                "#,
                params![namespace.name(), identity.method, identity.url],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(|e| SashiError::CacheUnavailable {
                message: format!("Failed to query cache entry: {}", e),
                source: Some(e),
            })?;

        let (status, headers_str, body, stored_at_str) = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let headers: Vec<(String, String)> = serde_json::from_str(&headers_str)?;
        let stored_at = DateTime::parse_from_rfc3339(&stored_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(CacheEntry {
            snapshot: ResponseSnapshot::new(status, headers, Bytes::from(body)),
            stored_at,
        }))
    }

    fn list_namespaces(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT namespace FROM snapshots")
            .map_err(|e| SashiError::CacheUnavailable {
                message: format!("Failed to list namespaces: {}", e),
                source: Some(e),
            })?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
            .map_err(|e| SashiError::CacheUnavailable {
                message: format!("Failed to list namespaces: {}", e),
                source: Some(e),
            })?;
        Ok(names)
    }

    fn delete_namespace(&self, name: &str) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM snapshots WHERE namespace = ?1", params![name])
            .map_err(|e| SashiError::CacheUnavailable {
                message: format!("Failed to delete namespace {}: {}", name, e),
                source: Some(e),
            })?;
        debug!("Deleted namespace {} ({} entries)", name, deleted);
        Ok(())
    }

    fn entry_count(&self, namespace: &CacheNamespace) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM snapshots WHERE namespace = ?1",
                params![namespace.name()],
                |row| row.get(0),
            )
            .map_err(|e| SashiError::CacheUnavailable {
                message: format!("Failed to count entries: {}", e),
                source: Some(e),
            })?;
        Ok(count as usize)
    }
}
