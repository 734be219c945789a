//! Configuration records handed to strategies.
//!
//! These mirror the JSON shapes used by pipeline hosts: camelCase top-level
//! keys with a free-form `configuration` object whose content each strategy
//! interprets. Unknown keys are ignored.

use crate::store::resolver::SchemaRef;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),
    #[error("Invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Invalid '{section}' configuration: {source}")]
    Invalid {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Expected a {expected} configuration")]
    WrongKind { expected: &'static str },
}

/// Describes a data resource: where to download it and what it contains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub configuration: Map<String, Value>,
}

impl ResourceConfig {
    pub fn new(download_url: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            download_url: Some(download_url.into()),
            media_type: Some(media_type.into()),
            configuration: Map::new(),
        }
    }

    pub fn with_configuration(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }

    /// The parsed download url.
    pub fn url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .download_url
            .as_deref()
            .ok_or(ConfigError::MissingField("downloadUrl"))?;
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn media_type(&self) -> Result<&str, ConfigError> {
        self.media_type
            .as_deref()
            .ok_or(ConfigError::MissingField("mediaType"))
    }
}

/// Describes a function step: its type and its free-form configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfig {
    pub function_type: String,
    #[serde(default)]
    pub configuration: Map<String, Value>,
}

impl FunctionConfig {
    pub fn new(function_type: impl Into<String>) -> Self {
        Self {
            function_type: function_type.into(),
            configuration: Map::new(),
        }
    }

    pub fn with_configuration(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.configuration.insert(key.into(), value.into());
        self
    }
}

fn from_configuration<T: DeserializeOwned>(
    section: &'static str,
    configuration: &Map<String, Value>,
) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(configuration.clone()))
        .map_err(|source| ConfigError::Invalid { section, source })
}

/// Selects the cache a strategy reads from and writes to.
///
/// Without a `cacheDir` the cache lent by the caller is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataCacheConfig {
    #[serde(default, alias = "cache_dir", skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

/// Configuration for the structure parser, read from `ResourceConfig.configuration`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomisticParseConfig {
    /// Explicit format name; detected from the resource when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fileformat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacache_config: Option<DataCacheConfig>,
}

impl AtomisticParseConfig {
    pub fn from_resource(resource: &ResourceConfig) -> Result<Self, ConfigError> {
        from_configuration("parse", &resource.configuration)
    }
}

/// Configuration for the structure mapper, read from `FunctionConfig.configuration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureMapperConfig {
    #[serde(default)]
    pub datamodel: SchemaRef,
    pub label: String,
    #[serde(rename = "datacacheKey")]
    pub datacache_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacache_config: Option<DataCacheConfig>,
    /// Directories searched for entity files before falling back to HTTP.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage_paths: Vec<PathBuf>,
}

impl StructureMapperConfig {
    pub fn new(label: impl Into<String>, datacache_key: impl Into<String>) -> Self {
        Self {
            datamodel: SchemaRef::default(),
            label: label.into(),
            datacache_key: datacache_key.into(),
            datacache_config: None,
            storage_paths: Vec::new(),
        }
    }

    pub fn from_function(function: &FunctionConfig) -> Result<Self, ConfigError> {
        let config: Self = from_configuration("mapper", &function.configuration)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.label.trim().is_empty() {
            return Err(ConfigError::EmptyField("label"));
        }
        if self.datacache_key.trim().is_empty() {
            return Err(ConfigError::EmptyField("datacacheKey"));
        }
        Ok(())
    }
}
