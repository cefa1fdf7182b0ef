//! Vector index and vector store traits
//!
//! Two shapes of semantic search are supported. A [`VectorIndexProvider`] is
//! a persistent, precomputed nearest-neighbour index over stored chunk
//! embeddings (the SQL path). An [`EphemeralVectorStore`] receives the
//! request's candidate embeddings, answers one query, and discards them.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::error::Result;

/// Tenant scope of an index query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexScope {
    pub tenant_id: i64,
    pub course_id: Option<i64>,
}

/// Persistent nearest-neighbour index keyed by chunk id
#[async_trait]
pub trait VectorIndexProvider: Send + Sync {
    /// `k` nearest chunks to `query`, keyed by chunk id
    ///
    /// An empty map means the index holds nothing for this scope.
    async fn nearest(
        &self,
        scope: IndexScope,
        query: &[f32],
        k: usize,
    ) -> Result<HashMap<String, IndexHit>>;

    /// Replace the scope's stored embeddings with `entries`
    ///
    /// A tenant-wide scope replaces every row of the tenant; a course scope
    /// only the rows of that course. Each row keeps its entry's own course.
    async fn upsert(&self, scope: IndexScope, entries: Vec<IndexEntry>) -> Result<usize>;

    /// Check if the index is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get index name for logging
    fn name(&self) -> &str;
}

/// One chunk embedding to store in a persistent index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub source_id: String,
    /// Course of the chunk's source
    pub course_id: Option<i64>,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// One nearest-neighbour result
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// Similarity in [0, 1]
    pub similarity: f32,
    /// [`content_hash`] of the text the embedding was computed from
    pub content_hash: String,
}

/// Fingerprint of chunk text
///
/// Chunk ids are positional, so an id alone does not say whether a stored
/// embedding still belongs to the chunk that now carries it.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Create-query-discard vector store
#[async_trait]
pub trait EphemeralVectorStore: Send + Sync {
    /// Index `(chunk id, embedding)` pairs in a throwaway collection, query it
    /// with `query` for up to `n` results, then drop the collection
    async fn rank(
        &self,
        entries: &[(String, Vec<f32>)],
        query: &[f32],
        n: usize,
    ) -> Result<HashMap<String, f32>>;

    /// Get store name for logging
    fn name(&self) -> &str;
}
