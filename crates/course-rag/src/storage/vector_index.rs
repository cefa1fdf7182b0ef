//! SQL nearest-neighbour index over the `chunks` table

use async_trait::async_trait;
use std::collections::HashMap;

use super::SqliteStore;
use crate::error::{Error, Result};
use crate::providers::vector_store::{IndexEntry, IndexHit};
use crate::providers::{IndexScope, VectorIndexProvider};

/// Precomputed chunk embeddings queried with `vec_distance`
pub struct SqliteVectorIndex {
    store: SqliteStore,
}

impl SqliteVectorIndex {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VectorIndexProvider for SqliteVectorIndex {
    async fn nearest(
        &self,
        scope: IndexScope,
        query: &[f32],
        k: usize,
    ) -> Result<HashMap<String, IndexHit>> {
        if query.is_empty() || k == 0 {
            return Ok(HashMap::new());
        }
        let store = self.store.clone();
        let query = query.to_vec();
        tokio::task::spawn_blocking(move || store.nearest_chunks(scope, &query, k))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
            .map_err(|e| Error::vector_index(e.to_string()))
    }

    async fn upsert(&self, scope: IndexScope, entries: Vec<IndexEntry>) -> Result<usize> {
        let store = self.store.clone();
        let count = tokio::task::spawn_blocking(move || store.upsert_chunks(scope, &entries))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
            .map_err(|e| Error::vector_index(e.to_string()))?;
        tracing::debug!(
            "Indexed {} chunks for tenant {} course {:?}",
            count,
            scope.tenant_id,
            scope.course_id
        );
        Ok(count)
    }

    async fn health_check(&self) -> Result<bool> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.ping())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false))
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
