use super::{CacheError, CacheValue, DataCache};
use std::collections::HashMap;
use tracing::trace;

/// A process-local cache backed by a hash map.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: HashMap<String, CacheValue>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DataCache for MemoryCache {
    fn get(&self, key: &str) -> Result<CacheValue, CacheError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::KeyNotFound(key.to_string()))
    }

    fn add(&mut self, value: CacheValue) -> Result<String, CacheError> {
        let key = value.content_key()?;
        trace!(key = %key, "Storing value in memory cache.");
        self.entries.insert(key.clone(), value);
        Ok(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}
