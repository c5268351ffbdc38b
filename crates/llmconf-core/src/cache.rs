// Resolution cache
//
// Process-wide memoization of the loaded config list. Constructed once at
// startup and shared by handle. No TTL: callers must invalidate after every
// mutation of the persisted store.
//
// The lock is never held across the load, so two concurrent misses may both
// load; the loader is idempotent and the last writer wins.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::loader::ConfigLoader;
use crate::models::CanonicalLlmConfig;

/// Shared, immutable snapshot of the resolved configs
pub type ConfigList = Arc<Vec<CanonicalLlmConfig>>;

/// Cache in front of the config loader
pub struct ConfigCache {
    loader: ConfigLoader,
    cached: RwLock<Option<ConfigList>>,
}

impl ConfigCache {
    pub fn new(loader: ConfigLoader) -> Self {
        Self {
            loader,
            cached: RwLock::new(None),
        }
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    /// Cached list when `use_cache` is set and one exists, otherwise a fresh load
    ///
    /// An empty list is a valid cached value.
    pub async fn get(&self, use_cache: bool) -> ConfigList {
        if use_cache {
            let cached = self.cached.read().clone();
            if let Some(cached) = cached {
                return cached;
            }
        }

        let loaded: ConfigList = Arc::new(self.loader.load_from_store().await);
        *self.cached.write() = Some(loaded.clone());
        tracing::debug!(count = loaded.len(), "LLM config cache populated");
        loaded
    }

    /// Clear the cache; the next `get` reloads
    pub fn invalidate(&self) {
        *self.cached.write() = None;
        tracing::debug!("LLM config cache invalidated");
    }

    /// Invalidate and load again
    pub async fn reload(&self) -> ConfigList {
        self.invalidate();
        self.get(false).await
    }

    /// Whether a list (possibly empty) is currently cached
    pub fn is_populated(&self) -> bool {
        self.cached.read().is_some()
    }
}
