use thiserror::Error;

use super::config::ConfigError;
use super::download::DownloadError;
use super::registry::StrategyKind;
use crate::core::io::format::ParseError;
use crate::store::cache::CacheError;
use crate::store::collection::CollectionError;
use crate::store::entity::SchemaError;
use crate::store::instance::InstanceError;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Missing session: {0}")]
    MissingSession(String),

    #[error("Cache error: {source}")]
    Cache {
        #[from]
        source: CacheError,
    },

    #[error("Failed to parse structure: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("Failed to resolve data model: {source}")]
    SchemaResolution {
        #[from]
        source: SchemaError,
    },

    #[error("Failed to populate instance: {source}")]
    Instance {
        #[from]
        source: InstanceError,
    },

    #[error("Collection error: {source}")]
    Collection {
        #[from]
        source: CollectionError,
    },

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("No strategy registered for {kind} '{value}'")]
    NotRegistered { kind: StrategyKind, value: String },

    #[error("Strategy '{strategy}' returned no '{key}' in its session update")]
    IncompleteUpdate {
        strategy: &'static str,
        key: &'static str,
    },
}
