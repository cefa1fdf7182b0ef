//! TTL-cached tenant configuration lookup

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::TenantRetrievalConfig;
use crate::config::TenantDefaults;
use crate::providers::TenantStore;

struct CachedConfig {
    config: TenantRetrievalConfig,
    loaded_at: Instant,
}

/// Loads each tenant's configuration once per TTL window
///
/// A missing settings row or a storage failure yields the process defaults.
/// Failures are not cached, so a recovered store is picked up on the next call.
pub struct TenantConfigResolver {
    store: Arc<dyn TenantStore>,
    defaults: TenantDefaults,
    ttl: Duration,
    cache: DashMap<i64, CachedConfig>,
}

impl TenantConfigResolver {
    pub fn new(store: Arc<dyn TenantStore>, defaults: TenantDefaults, ttl: Duration) -> Self {
        Self {
            store,
            defaults,
            ttl,
            cache: DashMap::new(),
        }
    }

    /// Effective configuration for a tenant; never fails
    pub async fn get(&self, tenant_id: i64) -> TenantRetrievalConfig {
        if let Some(entry) = self.cache.get(&tenant_id) {
            if entry.loaded_at.elapsed() < self.ttl {
                return entry.config.clone();
            }
        }

        match self.store.tenant_settings(tenant_id).await {
            Ok(stored) => {
                let config = match stored {
                    Some(stored) => TenantRetrievalConfig::from_stored(&stored, &self.defaults),
                    None => {
                        tracing::debug!("Tenant {} has no settings, using defaults", tenant_id);
                        self.default_config()
                    }
                };
                self.cache.insert(
                    tenant_id,
                    CachedConfig {
                        config: config.clone(),
                        loaded_at: Instant::now(),
                    },
                );
                config
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load settings for tenant {} ({}), using defaults",
                    tenant_id,
                    e
                );
                self.default_config()
            }
        }
    }

    /// Drop a tenant's cached configuration; returns whether one was cached
    pub fn invalidate(&self, tenant_id: i64) -> bool {
        self.cache.remove(&tenant_id).is_some()
    }

    /// Process defaults, normalized
    pub fn default_config(&self) -> TenantRetrievalConfig {
        TenantRetrievalConfig::from_defaults(&self.defaults)
    }

    /// Number of cached tenants
    pub fn cached_tenants(&self) -> usize {
        self.cache.len()
    }
}
