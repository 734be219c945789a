use super::{CacheError, CacheValue, DataCache};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// A cache persisted as one file per key under a directory.
///
/// Raw bytes are stored verbatim as `<key>.bin`, structures as JSON in
/// `<key>.json`, so separate processes pointed at the same directory see the
/// same entries.
#[derive(Debug, Clone)]
pub struct DirCache {
    root: PathBuf,
}

impl DirCache {
    /// Opens (and creates if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CacheError::Io {
            path: root.to_string_lossy().to_string(),
            source,
        })?;
        debug!("Opened directory cache at {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str, extension: &str) -> Option<PathBuf> {
        // Keys are hex digests; anything else could escape the cache directory.
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(self.root.join(format!("{}.{}", key, extension)))
    }

    fn io_error(path: &Path, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: path.to_string_lossy().to_string(),
            source,
        }
    }
}

impl DataCache for DirCache {
    fn get(&self, key: &str) -> Result<CacheValue, CacheError> {
        let not_found = || CacheError::KeyNotFound(key.to_string());

        let bin = self.entry_path(key, "bin").ok_or_else(not_found)?;
        if bin.is_file() {
            let bytes = fs::read(&bin).map_err(|e| Self::io_error(&bin, e))?;
            return Ok(CacheValue::Bytes(bytes));
        }

        let json = self.entry_path(key, "json").ok_or_else(not_found)?;
        if json.is_file() {
            let content = fs::read(&json).map_err(|e| Self::io_error(&json, e))?;
            return Ok(CacheValue::Structure(serde_json::from_slice(&content)?));
        }

        Err(not_found())
    }

    fn add(&mut self, value: CacheValue) -> Result<String, CacheError> {
        let key = value.content_key()?;
        let (extension, content) = match &value {
            CacheValue::Bytes(bytes) => ("bin", bytes.clone()),
            CacheValue::Structure(structure) => ("json", serde_json::to_vec(structure)?),
        };
        let path = self.root.join(format!("{}.{}", key, extension));
        trace!("Writing cache entry {:?}", path);
        fs::write(&path, content).map_err(|e| Self::io_error(&path, e))?;
        Ok(key)
    }

    fn contains(&self, key: &str) -> bool {
        ["bin", "json"]
            .iter()
            .filter_map(|ext| self.entry_path(key, ext))
            .any(|path| path.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::structure::AtomicStructure;
    use nalgebra::Point3;
    use tempfile::tempdir;

    #[test]
    fn entries_survive_reopening() {
        let dir = tempdir().unwrap();
        let structure =
            AtomicStructure::new(vec!["He".into()], vec![Point3::new(1.0, 2.0, 3.0)]).unwrap();

        let (bytes_key, structure_key) = {
            let mut cache = DirCache::open(dir.path()).unwrap();
            (
                cache.add(CacheValue::Bytes(b"payload".to_vec())).unwrap(),
                cache.add(CacheValue::Structure(structure.clone())).unwrap(),
            )
        };

        let reopened = DirCache::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get(&bytes_key).unwrap(),
            CacheValue::Bytes(b"payload".to_vec())
        );
        assert_eq!(reopened.get_structure(&structure_key).unwrap(), structure);
        assert!(dir.path().join(format!("{}.json", structure_key)).is_file());
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        let cache = DirCache::open(&nested).unwrap();
        assert!(cache.root().is_dir());
    }

    #[test]
    fn non_hex_keys_are_never_found() {
        let dir = tempdir().unwrap();
        let cache = DirCache::open(dir.path()).unwrap();
        assert!(!cache.contains("../etc/passwd"));
        assert!(matches!(
            cache.get("../etc/passwd"),
            Err(CacheError::KeyNotFound(_))
        ));
    }
}
