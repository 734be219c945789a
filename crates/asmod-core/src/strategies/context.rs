use super::config::DataCacheConfig;
use super::registry::StrategyRegistry;
use crate::store::cache::{CacheError, DataCache, DirCache};
use crate::store::collection::CollectionStore;
use tracing::debug;

/// Everything a strategy call may touch, lent by the caller for the duration of the call.
pub struct StrategyContext<'a> {
    pub registry: &'a StrategyRegistry,
    pub cache: &'a mut dyn DataCache,
    pub collections: &'a mut CollectionStore,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        registry: &'a StrategyRegistry,
        cache: &'a mut dyn DataCache,
        collections: &'a mut CollectionStore,
    ) -> Self {
        Self {
            registry,
            cache,
            collections,
        }
    }

    /// Returns the cache selected by `config`: a directory cache when it
    /// names a `cacheDir`, otherwise the caller's cache.
    pub fn cache_for(
        &mut self,
        config: Option<&DataCacheConfig>,
    ) -> Result<CacheHandle<'_>, CacheError> {
        match config.and_then(|c| c.cache_dir.as_ref()) {
            Some(dir) => {
                debug!("Using directory cache at {:?}", dir);
                Ok(CacheHandle::Dir(DirCache::open(dir)?))
            }
            None => Ok(CacheHandle::Shared(&mut *self.cache)),
        }
    }
}

pub enum CacheHandle<'c> {
    Shared(&'c mut dyn DataCache),
    Dir(DirCache),
}

impl CacheHandle<'_> {
    pub fn cache(&mut self) -> &mut dyn DataCache {
        match self {
            Self::Shared(cache) => &mut **cache,
            Self::Dir(cache) => cache,
        }
    }
}
