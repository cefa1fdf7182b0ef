//! SQLite storage for tenant settings, course material metadata and the chunk index
//!
//! The chunk index stores embeddings as little-endian `f32` blobs and exposes
//! a `vec_distance(a, b)` SQL function (cosine distance), so nearest-neighbour
//! queries read `ORDER BY vec_distance(embedding, ?) LIMIT k`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::vector_store::{content_hash, IndexEntry, IndexHit};
use crate::providers::{IndexScope, StoredTenantSettings, TenantStore};
use crate::retrieval::scoring::cosine_similarity;
use crate::types::{DocumentRecord, VideoRecord};

/// SQLite-backed storage collaborator
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;
        Self::from_connection(conn)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        register_vector_functions(&conn)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA temp_store=MEMORY;
        "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tenant_settings (
                tenant_id INTEGER PRIMARY KEY,
                chunking_strategy TEXT,
                retrieval_strategy TEXT,
                vector_store TEXT,
                embedding_provider TEXT,
                embedding_model TEXT,
                llm_provider TEXT,
                llm_model TEXT,
                temperature REAL,
                max_tokens INTEGER,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY,
                tenant_id INTEGER NOT NULL,
                course_id INTEGER,
                filename TEXT NOT NULL,
                file_path TEXT,
                uploaded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_tenant
                ON documents(tenant_id, course_id, uploaded_at);

            CREATE TABLE IF NOT EXISTS videos (
                id INTEGER PRIMARY KEY,
                tenant_id INTEGER NOT NULL,
                course_id INTEGER,
                title TEXT,
                youtube_url TEXT,
                source_type TEXT NOT NULL DEFAULT 'youtube',
                file_path TEXT,
                transcript TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_videos_tenant
                ON videos(tenant_id, course_id, created_at);

            -- Precomputed chunk embeddings for nearest-neighbour queries
            CREATE TABLE IF NOT EXISTS chunks (
                tenant_id INTEGER NOT NULL,
                chunk_id TEXT NOT NULL,
                course_id INTEGER,
                source_id TEXT NOT NULL,
                content TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                embedding BLOB,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, chunk_id)
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_scope ON chunks(tenant_id, course_id);
        "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to run migrations: {}", e)))?;

        // indexes written before content hashes were tracked; those rows never
        // match a chunk again and are replaced by the next reindex
        if !has_column(&conn, "chunks", "content_hash")? {
            conn.execute_batch("ALTER TABLE chunks ADD COLUMN content_hash TEXT NOT NULL DEFAULT ''")
                .map_err(|e| Error::Storage(format!("Failed to upgrade chunks table: {}", e)))?;
            tracing::info!("Added content_hash column to chunks table");
        }

        tracing::debug!("Database migrations complete");
        Ok(())
    }

    // ==================== Tenant Settings ====================

    /// Insert or replace a tenant's settings row
    pub fn put_tenant_settings(&self, tenant_id: i64, settings: &StoredTenantSettings) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO tenant_settings (
                tenant_id, chunking_strategy, retrieval_strategy, vector_store,
                embedding_provider, embedding_model, llm_provider, llm_model,
                temperature, max_tokens, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(tenant_id) DO UPDATE SET
                chunking_strategy = excluded.chunking_strategy,
                retrieval_strategy = excluded.retrieval_strategy,
                vector_store = excluded.vector_store,
                embedding_provider = excluded.embedding_provider,
                embedding_model = excluded.embedding_model,
                llm_provider = excluded.llm_provider,
                llm_model = excluded.llm_model,
                temperature = excluded.temperature,
                max_tokens = excluded.max_tokens,
                updated_at = excluded.updated_at
            "#,
            params![
                tenant_id,
                settings.chunking_strategy,
                settings.retrieval_strategy,
                settings.vector_store,
                settings.embedding_provider,
                settings.embedding_model,
                settings.llm_provider,
                settings.llm_model,
                settings.temperature.map(f64::from),
                settings.max_tokens.map(i64::from),
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// Load a tenant's settings row
    pub fn load_tenant_settings(&self, tenant_id: i64) -> Result<Option<StoredTenantSettings>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                r#"
                SELECT chunking_strategy, retrieval_strategy, vector_store,
                       embedding_provider, embedding_model, llm_provider, llm_model,
                       temperature, max_tokens
                FROM tenant_settings WHERE tenant_id = ?1
                "#,
                params![tenant_id],
                |row| {
                    Ok(StoredTenantSettings {
                        chunking_strategy: row.get(0)?,
                        retrieval_strategy: row.get(1)?,
                        vector_store: row.get(2)?,
                        embedding_provider: row.get(3)?,
                        embedding_model: row.get(4)?,
                        llm_provider: row.get(5)?,
                        llm_model: row.get(6)?,
                        temperature: row.get::<_, Option<f64>>(7)?.map(|t| t as f32),
                        max_tokens: row
                            .get::<_, Option<i64>>(8)?
                            .map(|t| t.clamp(0, i64::from(u32::MAX)) as u32),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ==================== Course Materials ====================

    /// Insert or replace a document record
    pub fn insert_document(&self, doc: &DocumentRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO documents (id, tenant_id, course_id, filename, file_path, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                doc.id,
                doc.tenant_id,
                doc.course_id,
                doc.filename,
                doc.file_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                doc.uploaded_at,
            ],
        )?;
        Ok(())
    }

    /// Insert or replace a video record
    pub fn insert_video(&self, video: &VideoRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO videos (
                id, tenant_id, course_id, title, youtube_url, source_type, file_path, transcript, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                video.id,
                video.tenant_id,
                video.course_id,
                video.title,
                video.youtube_url,
                video.source_type,
                video.file_path.as_ref().map(|p| p.to_string_lossy().to_string()),
                video.transcript,
                video.created_at,
            ],
        )?;
        Ok(())
    }

    /// Most recent documents of a tenant, optionally one course
    pub fn list_documents(
        &self,
        tenant_id: i64,
        course_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<DocumentRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, tenant_id, course_id, filename, file_path, uploaded_at
            FROM documents
            WHERE tenant_id = ?1 AND (?2 IS NULL OR course_id = ?2)
            ORDER BY uploaded_at DESC, id DESC
            LIMIT ?3
            "#,
        )?;
        let rows = stmt
            .query_map(params![tenant_id, course_id, limit as i64], row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent videos of a tenant, optionally one course
    pub fn list_videos(
        &self,
        tenant_id: i64,
        course_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<VideoRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, tenant_id, course_id, title, youtube_url, source_type, file_path, transcript, created_at
            FROM videos
            WHERE tenant_id = ?1 AND (?2 IS NULL OR course_id = ?2)
            ORDER BY created_at DESC, id DESC
            LIMIT ?3
            "#,
        )?;
        let rows = stmt
            .query_map(params![tenant_id, course_id, limit as i64], row_to_video)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Store a video transcript; returns whether the video exists
    pub fn update_transcript(&self, video_id: i64, transcript: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE videos SET transcript = ?1 WHERE id = ?2",
            params![transcript, video_id],
        )?;
        Ok(updated > 0)
    }

    // ==================== Chunk Index ====================

    /// Replace the chunk embeddings of a scope
    ///
    /// Rows of the scope that are not in `entries` are dropped, so chunk ids
    /// left over from an earlier chunking never linger. Every row records
    /// its entry's own course.
    pub fn upsert_chunks(&self, scope: IndexScope, entries: &[IndexEntry]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM chunks WHERE tenant_id = ?1 AND (?2 IS NULL OR course_id = ?2)",
            params![scope.tenant_id, scope.course_id],
        )?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO chunks
                    (tenant_id, chunk_id, course_id, source_id, content, content_hash,
                     embedding, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            let now = Utc::now();
            for entry in entries {
                stmt.execute(params![
                    scope.tenant_id,
                    entry.chunk_id,
                    entry.course_id,
                    entry.source_id,
                    entry.content,
                    content_hash(&entry.content),
                    encode_vector(&entry.embedding),
                    now,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(
            "Replaced {} chunk rows with {} for tenant {} course {:?}",
            removed,
            entries.len(),
            scope.tenant_id,
            scope.course_id
        );
        Ok(entries.len())
    }

    /// Nearest chunks by cosine distance, keyed by chunk id
    pub fn nearest_chunks(
        &self,
        scope: IndexScope,
        query: &[f32],
        k: usize,
    ) -> Result<HashMap<String, IndexHit>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT chunk_id, content_hash, distance FROM (
                SELECT chunk_id, content_hash, vec_distance(embedding, ?1) AS distance
                FROM chunks
                WHERE tenant_id = ?2
                  AND (?3 IS NULL OR course_id = ?3)
                  AND embedding IS NOT NULL
            )
            WHERE distance IS NOT NULL
            ORDER BY distance ASC
            LIMIT ?4
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![encode_vector(query), scope.tenant_id, scope.course_id, k as i64],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, f64>(2)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(id, content_hash, distance)| {
                let hit = IndexHit {
                    similarity: (1.0 - distance as f32).clamp(0.0, 1.0),
                    content_hash,
                };
                (id, hit)
            })
            .collect())
    }

    /// Number of indexed chunks in a scope
    pub fn count_chunks(&self, scope: IndexScope) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunks WHERE tenant_id = ?1 AND (?2 IS NULL OR course_id = ?2)",
            params![scope.tenant_id, scope.course_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Connectivity check
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Run a synchronous operation on the blocking pool
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteStore) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl TenantStore for SqliteStore {
    async fn tenant_settings(&self, tenant_id: i64) -> Result<Option<StoredTenantSettings>> {
        self.blocking(move |db| db.load_tenant_settings(tenant_id)).await
    }

    async fn documents(
        &self,
        tenant_id: i64,
        course_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<DocumentRecord>> {
        self.blocking(move |db| db.list_documents(tenant_id, course_id, limit))
            .await
    }

    async fn videos(
        &self,
        tenant_id: i64,
        course_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<VideoRecord>> {
        self.blocking(move |db| db.list_videos(tenant_id, course_id, limit))
            .await
    }

    async fn save_transcript(&self, video_id: i64, transcript: &str) -> Result<()> {
        let transcript = transcript.to_string();
        let found = self
            .blocking(move |db| db.update_transcript(video_id, &transcript))
            .await?;
        if !found {
            tracing::debug!("Transcript for unknown video {} not saved", video_id);
        }
        Ok(())
    }

    async fn save_settings(&self, tenant_id: i64, settings: &StoredTenantSettings) -> Result<()> {
        let settings = settings.clone();
        self.blocking(move |db| db.put_tenant_settings(tenant_id, &settings))
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.blocking(|db| db.ping()).await.is_ok())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        course_id: row.get(2)?,
        filename: row.get(3)?,
        file_path: row.get::<_, Option<String>>(4)?.map(PathBuf::from),
        uploaded_at: row.get::<_, DateTime<Utc>>(5)?,
    })
}

fn row_to_video(row: &Row<'_>) -> rusqlite::Result<VideoRecord> {
    Ok(VideoRecord {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        course_id: row.get(2)?,
        title: row.get(3)?,
        youtube_url: row.get(4)?,
        source_type: row.get(5)?,
        file_path: row.get::<_, Option<String>>(6)?.map(PathBuf::from),
        transcript: row.get(7)?,
        created_at: row.get::<_, DateTime<Utc>>(8)?,
    })
}

/// Whether `table` already has `column`
pub(crate) fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

/// Serialize a vector as little-endian `f32` bytes
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`]; `None` for a blob of the wrong length
pub fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// Register `vec_distance(a, b)`: cosine distance, NULL for missing or
/// mismatched vectors
fn register_vector_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "vec_distance",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a = ctx.get::<Option<Vec<u8>>>(0)?;
            let b = ctx.get::<Option<Vec<u8>>>(1)?;
            let distance = match (a.as_deref().and_then(decode_vector), b.as_deref().and_then(decode_vector)) {
                (Some(a), Some(b)) if !a.is_empty() && a.len() == b.len() => {
                    Some(1.0 - f64::from(cosine_similarity(&a, &b)))
                }
                _ => None,
            };
            Ok(distance)
        },
    )
    .map_err(|e| Error::Storage(format!("Failed to register vector functions: {}", e)))
}
