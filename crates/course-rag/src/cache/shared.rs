//! Shared answer cache tier

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::storage::has_column;

/// Key-value cache shared between processes
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Serialized value, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value owned by `tenant_id`
    async fn set(&self, key: &str, tenant_id: i64, value: String, ttl: Duration) -> Result<()>;

    /// Drop every entry of a tenant; returns how many were removed
    async fn invalidate_tenant(&self, tenant_id: i64) -> Result<usize>;

    fn name(&self) -> &str;
}

/// SQLite-file shared tier
#[derive(Clone)]
pub struct SqliteSharedCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSharedCache {
    /// Open or create the cache database at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open cache database: {}", e)))?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS answer_cache (
                key TEXT PRIMARY KEY,
                tenant_id INTEGER NOT NULL,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
        "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to create cache table: {}", e)))?;
        if !has_column(&conn, "answer_cache", "tenant_id")? {
            // entries without an owner cannot be invalidated per tenant
            conn.execute_batch(
                r#"
                DROP TABLE answer_cache;
                CREATE TABLE answer_cache (
                    key TEXT PRIMARY KEY,
                    tenant_id INTEGER NOT NULL,
                    value TEXT NOT NULL,
                    expires_at INTEGER NOT NULL
                );
            "#,
            )?;
            tracing::info!("Recreated shared answer cache table with tenant ownership");
        }
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_answer_cache_tenant ON answer_cache(tenant_id);",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn get_sync(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let now = Utc::now().timestamp();
        let value = conn
            .query_row(
                "SELECT value FROM answer_cache WHERE key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        if value.is_none() {
            conn.execute(
                "DELETE FROM answer_cache WHERE key = ?1 AND expires_at <= ?2",
                params![key, now],
            )?;
        }
        Ok(value)
    }

    fn set_sync(&self, key: &str, tenant_id: i64, value: &str, ttl: Duration) -> Result<()> {
        let conn = self.conn.lock();
        let expires_at = Utc::now().timestamp() + ttl.as_secs() as i64;
        conn.execute(
            "INSERT OR REPLACE INTO answer_cache (key, tenant_id, value, expires_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![key, tenant_id, value, expires_at],
        )?;
        Ok(())
    }

    fn invalidate_tenant_sync(&self, tenant_id: i64) -> Result<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute(
            "DELETE FROM answer_cache WHERE tenant_id = ?1",
            params![tenant_id],
        )?)
    }
}

#[async_trait]
impl SharedCache for SqliteSharedCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let cache = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || cache.get_sync(&key)).await?
    }

    async fn set(&self, key: &str, tenant_id: i64, value: String, ttl: Duration) -> Result<()> {
        let cache = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || cache.set_sync(&key, tenant_id, &value, ttl)).await?
    }

    async fn invalidate_tenant(&self, tenant_id: i64) -> Result<usize> {
        let cache = self.clone();
        tokio::task::spawn_blocking(move || cache.invalidate_tenant_sync(tenant_id)).await?
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
