use super::entity::{Entity, SchemaError};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Reference to an entity schema: a remote uri or a local JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SchemaRef {
    Url(Url),
    Path(PathBuf),
}

impl From<String> for SchemaRef {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(r) => r,
            Err(never) => match never {},
        }
    }
}

impl From<SchemaRef> for String {
    fn from(r: SchemaRef) -> Self {
        r.to_string()
    }
}

impl FromStr for SchemaRef {
    type Err = std::convert::Infallible;

    /// `http(s)` uris are kept as urls, `file` uris become paths, and anything
    /// else is taken as a filesystem path. A leading `json://` storage prefix is dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("json://").unwrap_or(s);
        Ok(match Url::parse(s) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Url(url),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Self::Path)
                .unwrap_or_else(|_| Self::Path(PathBuf::from(url.path()))),
            _ => Self::Path(PathBuf::from(s)),
        })
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{}", url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Default for SchemaRef {
    fn default() -> Self {
        "http://onto-ns.com/meta/0.1/Molecule"
            .parse()
            .unwrap_or_else(|never| match never {})
    }
}

/// Resolves [`SchemaRef`]s into entities.
///
/// Relative paths and uris are first looked up in the configured storage
/// paths; uris missing locally are fetched over HTTP.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolver {
    storage_paths: Vec<PathBuf>,
}

impl SchemaResolver {
    pub fn new(storage_paths: Vec<PathBuf>) -> Self {
        Self { storage_paths }
    }

    pub fn resolve(&self, schema: &SchemaRef) -> Result<Entity, SchemaError> {
        match schema {
            SchemaRef::Path(path) => self.resolve_path(path),
            SchemaRef::Url(url) => match self.find_local(url.as_str()) {
                Some(entity) => Ok(entity),
                None => Self::fetch(url),
            },
        }
    }

    fn resolve_path(&self, path: &Path) -> Result<Entity, SchemaError> {
        if path.is_relative() && !path.exists() {
            if let Some(found) = self
                .storage_paths
                .iter()
                .map(|dir| dir.join(path))
                .find(|candidate| candidate.is_file())
            {
                debug!("Resolved schema {:?} to {:?}", path, found);
                return Entity::load(&found);
            }
        }
        Entity::load(path)
    }

    /// Scans the storage paths for an entity file whose uri equals `uri`.
    fn find_local(&self, uri: &str) -> Option<Entity> {
        let wanted = uri.trim_end_matches('/');
        for dir in &self.storage_paths {
            let Ok(entries) = fs::read_dir(dir) else {
                warn!("Schema storage path {:?} is not readable, skipping.", dir);
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match Entity::load(&path) {
                    Ok(entity) if entity.uri.trim_end_matches('/') == wanted => {
                        debug!("Found schema '{}' in {:?}", uri, path);
                        return Some(entity);
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Skipping {:?} while looking for '{}': {}", path, uri, e),
                }
            }
        }
        None
    }

    fn fetch(url: &Url) -> Result<Entity, SchemaError> {
        debug!("Fetching schema from {}", url);
        let http_err = |source| SchemaError::Http {
            url: url.to_string(),
            source,
        };
        let body = reqwest::blocking::get(url.clone())
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text())
            .map_err(http_err)?;
        Entity::from_json_str(&body, url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const POINT: &str = r#"{"uri": "http://example.com/meta/0.1/Point", "properties": {"x": {"type": "float"}}}"#;

    #[test]
    fn parses_urls_and_paths() {
        assert!(matches!(
            "http://onto-ns.com/meta/0.1/Molecule".parse::<SchemaRef>().unwrap(),
            SchemaRef::Url(_)
        ));
        assert_eq!(
            "json:///app/entities/Molecule.json".parse::<SchemaRef>().unwrap(),
            SchemaRef::Path(PathBuf::from("/app/entities/Molecule.json"))
        );
        assert_eq!(
            "entities/Molecule.json".parse::<SchemaRef>().unwrap(),
            SchemaRef::Path(PathBuf::from("entities/Molecule.json"))
        );
    }

    #[test]
    fn default_points_at_molecule_entity() {
        assert_eq!(
            SchemaRef::default().to_string(),
            "http://onto-ns.com/meta/0.1/Molecule"
        );
    }

    #[test]
    fn resolves_relative_path_through_storage_paths() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Point.json"), POINT).unwrap();
        let resolver = SchemaResolver::new(vec![dir.path().to_path_buf()]);
        let entity = resolver
            .resolve(&SchemaRef::Path(PathBuf::from("Point.json")))
            .unwrap();
        assert_eq!(entity.uri, "http://example.com/meta/0.1/Point");
    }

    #[test]
    fn resolves_uri_from_local_storage_without_network() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        fs::write(dir.path().join("Point.json"), POINT).unwrap();
        let resolver = SchemaResolver::new(vec![dir.path().to_path_buf()]);
        let schema: SchemaRef = "http://example.com/meta/0.1/Point".parse().unwrap();
        assert_eq!(resolver.resolve(&schema).unwrap().properties.len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let resolver = SchemaResolver::default();
        let result = resolver.resolve(&SchemaRef::Path(PathBuf::from("/nonexistent/X.json")));
        assert!(matches!(result, Err(SchemaError::Io { .. })));
    }
}
