//! Content-addressed key/value cache shared between strategies.
//!
//! Values are either raw downloaded bytes or parsed structures. Keys are the
//! hex SHA-256 digest of the value's encoded form, so adding the same content
//! twice yields the same key.

mod dir;
mod memory;

pub use dir::DirCache;
pub use memory::MemoryCache;

use crate::core::models::structure::AtomicStructure;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Key not found in cache: '{0}'")]
    KeyNotFound(String),
    #[error("Value under key '{key}' is not {expected}")]
    UnexpectedValue { key: String, expected: &'static str },
    #[error("Cache I/O error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to encode or decode a cached value: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A value stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheValue {
    Bytes(Vec<u8>),
    Structure(AtomicStructure),
}

impl CacheValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Structure(_) => None,
        }
    }

    pub fn as_structure(&self) -> Option<&AtomicStructure> {
        match self {
            Self::Structure(structure) => Some(structure),
            Self::Bytes(_) => None,
        }
    }

    pub fn into_structure(self) -> Option<AtomicStructure> {
        match self {
            Self::Structure(structure) => Some(structure),
            Self::Bytes(_) => None,
        }
    }

    /// The content-derived key this value is stored under.
    pub fn content_key(&self) -> Result<String, CacheError> {
        let mut hasher = Sha256::new();
        match self {
            Self::Bytes(bytes) => {
                hasher.update(b"bytes:");
                hasher.update(bytes);
            }
            Self::Structure(structure) => {
                hasher.update(b"structure:");
                hasher.update(serde_json::to_vec(structure)?);
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<AtomicStructure> for CacheValue {
    fn from(structure: AtomicStructure) -> Self {
        Self::Structure(structure)
    }
}

/// The cache interface the strategies are written against.
pub trait DataCache {
    /// Returns a copy of the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::KeyNotFound`] if nothing is stored under `key`.
    fn get(&self, key: &str) -> Result<CacheValue, CacheError>;

    /// Stores `value` and returns its key. Existing entries under the same key are overwritten.
    fn add(&mut self, value: CacheValue) -> Result<String, CacheError>;

    fn contains(&self, key: &str) -> bool;

    /// Fetches the structure stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnexpectedValue`] if the key holds raw bytes.
    fn get_structure(&self, key: &str) -> Result<AtomicStructure, CacheError> {
        self.get(key)?
            .into_structure()
            .ok_or_else(|| CacheError::UnexpectedValue {
                key: key.to_string(),
                expected: "a structure",
            })
    }

    /// Materializes the bytes under `key` as a temporary file named
    /// `<prefix>XXXX.<suffix>`. The file is deleted when the handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnexpectedValue`] if the key holds a structure
    /// rather than raw bytes.
    fn getfile(
        &self,
        key: &str,
        suffix: Option<&str>,
        prefix: Option<&str>,
    ) -> Result<NamedTempFile, CacheError> {
        let value = self.get(key)?;
        let bytes = value.as_bytes().ok_or_else(|| CacheError::UnexpectedValue {
            key: key.to_string(),
            expected: "raw bytes",
        })?;

        let suffix = suffix.map(|s| format!(".{}", s)).unwrap_or_default();
        let io_err = |source| CacheError::Io {
            path: std::env::temp_dir().to_string_lossy().to_string(),
            source,
        };
        let mut file = tempfile::Builder::new()
            .prefix(prefix.unwrap_or("asmod-"))
            .suffix(&suffix)
            .tempfile()
            .map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;
    use std::fs;

    fn hydrogen() -> AtomicStructure {
        AtomicStructure::new(vec!["H".into()], vec![Point3::origin()]).unwrap()
    }

    #[test]
    fn content_key_is_stable_and_type_sensitive() {
        let a = CacheValue::Bytes(b"abc".to_vec());
        let b = CacheValue::Bytes(b"abc".to_vec());
        assert_eq!(a.content_key().unwrap(), b.content_key().unwrap());
        assert_eq!(a.content_key().unwrap().len(), 64);

        let structure = CacheValue::Structure(hydrogen());
        assert_ne!(a.content_key().unwrap(), structure.content_key().unwrap());
    }

    #[test]
    fn getfile_writes_bytes_and_cleans_up_on_drop() {
        let mut cache = MemoryCache::new();
        let key = cache.add(b"1\n\nH 0 0 0\n".to_vec().into()).unwrap();

        let path = {
            let file = cache.getfile(&key, Some("xyz"), Some("Hydrogen")).unwrap();
            let path = file.path().to_path_buf();
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("Hydrogen"));
            assert!(name.ends_with(".xyz"));
            assert_eq!(fs::read(&path).unwrap(), b"1\n\nH 0 0 0\n");
            path
        };
        assert!(!path.exists());
    }

    #[test]
    fn getfile_rejects_structures() {
        let mut cache = MemoryCache::new();
        let key = cache.add(hydrogen().into()).unwrap();
        assert!(matches!(
            cache.getfile(&key, None, None),
            Err(CacheError::UnexpectedValue { .. })
        ));
    }

    #[test]
    fn get_structure_rejects_bytes() {
        let mut cache = MemoryCache::new();
        let key = cache.add(b"raw".to_vec().into()).unwrap();
        assert!(matches!(
            cache.get_structure(&key),
            Err(CacheError::UnexpectedValue { expected: "a structure", .. })
        ));
    }
}
