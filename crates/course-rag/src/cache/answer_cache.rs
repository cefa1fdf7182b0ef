//! Two-tier answer cache keyed by request and effective configuration

use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::shared::SharedCache;
use crate::tenant::TenantRetrievalConfig;
use crate::types::{AnswerResult, DegradedReason};

/// Stable cache key over everything that can change an answer
///
/// Covers tenant, course, the normalized question, every resolved
/// configuration field, `top_k` and the grounding threshold, so a settings
/// change never serves a stale answer.
pub fn cache_key(
    tenant_id: i64,
    course_id: Option<i64>,
    question: &str,
    config: &TenantRetrievalConfig,
    top_k: usize,
    min_grounding_score: f32,
) -> String {
    let normalized = question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let config_json = serde_json::to_string(config).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(tenant_id.to_le_bytes());
    hasher.update(course_id.map_or(-1i64, |c| c).to_le_bytes());
    hasher.update(course_id.is_some().to_string().as_bytes());
    hasher.update(normalized.as_bytes());
    hasher.update([0u8]);
    hasher.update(config_json.as_bytes());
    hasher.update(top_k.to_le_bytes());
    hasher.update(min_grounding_score.to_bits().to_le_bytes());
    hex::encode(hasher.finalize())
}

struct LocalEntry {
    value: AnswerResult,
    tenant_id: i64,
    inserted_at: Instant,
    hit_count: u32,
}

/// Result of a cache lookup
#[derive(Debug, Default)]
pub struct CacheLookup {
    pub hit: Option<AnswerResult>,
    /// Set when the shared tier failed during the lookup
    pub degraded: Option<DegradedReason>,
}

/// Answer cache: bounded local tier plus optional shared tier
pub struct AnswerCache {
    local: DashMap<String, LocalEntry>,
    shared: Option<Arc<dyn SharedCache>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    shared_errors: AtomicU64,
}

impl AnswerCache {
    /// Create a cache with a local TTL and entry cap
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            local: DashMap::new(),
            shared: None,
            ttl,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            shared_errors: AtomicU64::new(0),
        }
    }

    /// Put a shared tier behind the local one
    pub fn with_shared(mut self, shared: Arc<dyn SharedCache>) -> Self {
        self.shared = Some(shared);
        self
    }

    /// Look an answer up, local tier first
    pub async fn get(&self, key: &str, tenant_id: i64) -> CacheLookup {
        if let Some(hit) = self.get_local(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Answer cache hit: {}", &key[..12.min(key.len())]);
            return CacheLookup {
                hit: Some(hit),
                degraded: None,
            };
        }

        let mut lookup = CacheLookup::default();
        if let Some(shared) = &self.shared {
            match shared.get(key).await {
                Ok(Some(raw)) => match serde_json::from_str::<AnswerResult>(&raw) {
                    Ok(value) => {
                        tracing::debug!("Shared cache hit: {}", &key[..12.min(key.len())]);
                        self.put_local(key, value.clone(), tenant_id);
                        lookup.hit = Some(value);
                    }
                    Err(e) => {
                        tracing::warn!("Discarding undecodable shared cache entry: {}", e);
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    self.shared_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Shared cache {} read failed: {}", shared.name(), e);
                    lookup.degraded = Some(DegradedReason::SharedCacheUnavailable(e.to_string()));
                }
            }
        }

        if lookup.hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        lookup
    }

    /// Store an answer in both tiers
    ///
    /// Returns a degradation when the shared tier rejected the write.
    pub async fn set(&self, key: &str, tenant_id: i64, value: &AnswerResult) -> Option<DegradedReason> {
        self.put_local(key, value.clone(), tenant_id);

        let shared = self.shared.as_ref()?;
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => return Some(DegradedReason::SharedCacheUnavailable(e.to_string())),
        };
        match shared.set(key, tenant_id, raw, self.ttl).await {
            Ok(()) => None,
            Err(e) => {
                self.shared_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Shared cache {} write failed: {}", shared.name(), e);
                Some(DegradedReason::SharedCacheUnavailable(e.to_string()))
            }
        }
    }

    fn get_local(&self, key: &str) -> Option<AnswerResult> {
        let mut entry = self.local.get_mut(key)?;
        if entry.inserted_at.elapsed() >= self.ttl {
            drop(entry);
            self.local.remove(key);
            return None;
        }
        entry.hit_count += 1;
        Some(entry.value.clone())
    }

    fn put_local(&self, key: &str, value: AnswerResult, tenant_id: i64) {
        if self.local.len() >= self.max_entries && !self.local.contains_key(key) {
            // Evict the oldest entry
            let oldest = self
                .local
                .iter()
                .min_by_key(|e| e.inserted_at)
                .map(|e| e.key().clone());
            if let Some(oldest) = oldest {
                self.local.remove(&oldest);
            }
        }
        self.local.insert(
            key.to_string(),
            LocalEntry {
                value,
                tenant_id,
                inserted_at: Instant::now(),
                hit_count: 0,
            },
        );
    }

    /// Drop every entry of a tenant from both tiers
    ///
    /// Returns how many entries were removed. A failing shared tier is
    /// logged and counted; its entries then live out their TTL.
    pub async fn invalidate_tenant(&self, tenant_id: i64) -> usize {
        let before = self.local.len();
        self.local.retain(|_, e| e.tenant_id != tenant_id);
        let mut removed = before.saturating_sub(self.local.len());

        if let Some(shared) = &self.shared {
            match shared.invalidate_tenant(tenant_id).await {
                Ok(count) => removed += count,
                Err(e) => {
                    self.shared_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "Shared cache {} invalidation failed for tenant {}: {}",
                        shared.name(),
                        tenant_id,
                        e
                    );
                }
            }
        }

        if removed > 0 {
            tracing::info!("Invalidated {} cached answers for tenant {}", removed, tenant_id);
        }
        removed
    }

    /// Clear the local tier
    pub fn clear(&self) {
        self.local.clear();
        tracing::info!("Answer cache cleared");
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.local.len(),
            entry_hits: self.local.iter().map(|e| e.hit_count as u64).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            shared_errors: self.shared_errors.load(Ordering::Relaxed),
            max_entries: self.max_entries,
            ttl_seconds: self.ttl.as_secs(),
            shared_tier: self.shared.as_ref().map(|s| s.name().to_string()),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    /// Hits served by entries currently cached
    pub entry_hits: u64,
    pub hits: u64,
    pub misses: u64,
    pub shared_errors: u64,
    pub max_entries: usize,
    pub ttl_seconds: u64,
    pub shared_tier: Option<String>,
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(90), 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SqliteSharedCache;
    use crate::config::TenantDefaults;
    use crate::error::{Error, Result};
    use crate::types::StrategyMetadata;
    use async_trait::async_trait;

    struct BrokenShared;

    #[async_trait]
    impl SharedCache for BrokenShared {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::storage("redis down"))
        }

        async fn set(&self, _key: &str, _tenant_id: i64, _value: String, _ttl: Duration) -> Result<()> {
            Err(Error::storage("redis down"))
        }

        async fn invalidate_tenant(&self, _tenant_id: i64) -> Result<usize> {
            Err(Error::storage("redis down"))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn answer(text: &str) -> AnswerResult {
        AnswerResult::grounded(text.to_string(), Vec::new(), StrategyMetadata::default())
    }

    fn config() -> TenantRetrievalConfig {
        TenantRetrievalConfig::from_defaults(&TenantDefaults::default())
    }

    #[test]
    fn test_key_covers_every_input() {
        let base = cache_key(1, Some(2), "What is a BST?", &config(), 5, 0.18);
        assert_eq!(base, cache_key(1, Some(2), "  what is a   bst? ", &config(), 5, 0.18));
        assert_ne!(base, cache_key(2, Some(2), "What is a BST?", &config(), 5, 0.18));
        assert_ne!(base, cache_key(1, None, "What is a BST?", &config(), 5, 0.18));
        assert_ne!(base, cache_key(1, Some(2), "What is a heap?", &config(), 5, 0.18));
        assert_ne!(base, cache_key(1, Some(2), "What is a BST?", &config(), 6, 0.18));
        assert_ne!(base, cache_key(1, Some(2), "What is a BST?", &config(), 5, 0.2));

        let mut changed = config();
        changed.temperature = 0.7;
        assert_ne!(base, cache_key(1, Some(2), "What is a BST?", &changed, 5, 0.18));
        let mut changed = config();
        changed.llm_model = Some("other".to_string());
        assert_ne!(base, cache_key(1, Some(2), "What is a BST?", &changed, 5, 0.18));
    }

    #[tokio::test]
    async fn test_local_hit_and_stats() {
        let cache = AnswerCache::default();
        assert!(cache.get("k", 1).await.hit.is_none());
        assert!(cache.set("k", 1, &answer("a")).await.is_none());
        assert_eq!(cache.get("k", 1).await.hit, Some(answer("a")));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.entry_hits, 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = AnswerCache::new(Duration::ZERO, 8);
        cache.set("k", 1, &answer("a")).await;
        assert!(cache.get("k", 1).await.hit.is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_oldest_evicted_at_capacity() {
        let cache = AnswerCache::new(Duration::from_secs(60), 2);
        cache.set("a", 1, &answer("a")).await;
        cache.set("b", 1, &answer("b")).await;
        cache.set("c", 1, &answer("c")).await;
        assert_eq!(cache.stats().entries, 2);
        assert!(cache.get("a", 1).await.hit.is_none());
        assert!(cache.get("c", 1).await.hit.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_tenant() {
        let cache = AnswerCache::default();
        cache.set("a", 1, &answer("a")).await;
        cache.set("b", 2, &answer("b")).await;
        assert_eq!(cache.invalidate_tenant(1).await, 1);
        assert!(cache.get("a", 1).await.hit.is_none());
        assert!(cache.get("b", 2).await.hit.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_tenant_reaches_shared_tier() {
        let shared = Arc::new(SqliteSharedCache::in_memory().unwrap());
        let cache = AnswerCache::default().with_shared(shared.clone());
        cache.set("a", 1, &answer("stale")).await;
        cache.set("b", 2, &answer("other")).await;

        // one local entry plus one shared row
        assert_eq!(cache.invalidate_tenant(1).await, 2);

        // another process sharing the tier must not see the old answer
        let peer = AnswerCache::default().with_shared(shared);
        assert!(peer.get("a", 1).await.hit.is_none());
        assert_eq!(peer.get("b", 2).await.hit, Some(answer("other")));
    }

    #[tokio::test]
    async fn test_shared_tier_backfills_local() {
        let shared = Arc::new(SqliteSharedCache::in_memory().unwrap());
        let writer = AnswerCache::default().with_shared(shared.clone());
        writer.set("k", 1, &answer("shared")).await;

        let reader = AnswerCache::default().with_shared(shared);
        assert_eq!(reader.get("k", 1).await.hit, Some(answer("shared")));
        assert_eq!(reader.stats().entries, 1);
    }

    #[tokio::test]
    async fn test_broken_shared_tier_is_advisory() {
        let cache = AnswerCache::default().with_shared(Arc::new(BrokenShared));
        let lookup = cache.get("k", 1).await;
        assert!(lookup.hit.is_none());
        assert!(matches!(lookup.degraded, Some(DegradedReason::SharedCacheUnavailable(_))));

        assert!(cache.set("k", 1, &answer("a")).await.is_some());
        // the local tier still serves it
        assert_eq!(cache.get("k", 1).await.hit, Some(answer("a")));
        assert_eq!(cache.invalidate_tenant(1).await, 1);
        assert_eq!(cache.stats().shared_errors, 3);
    }
}
