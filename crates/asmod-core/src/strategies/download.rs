use super::Strategy;
use super::config::{ConfigError, DataCacheConfig, ResourceConfig};
use super::context::StrategyContext;
use super::error::StrategyError;
use super::session::{Session, SessionUpdate};
use crate::store::cache::{CacheError, CacheValue};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Url '{0}' does not point to a local file")]
    NotAFilePath(String),
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to store downloaded content: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Debug, Default, Deserialize)]
struct DownloadCacheConfig {
    #[serde(default)]
    datacache_config: Option<DataCacheConfig>,
}

fn cache_config(resource: &ResourceConfig) -> Result<Option<DataCacheConfig>, StrategyError> {
    let parsed: DownloadCacheConfig =
        serde_json::from_value(serde_json::Value::Object(resource.configuration.clone()))
            .map_err(|source| ConfigError::Invalid {
                section: "download",
                source,
            })?;
    Ok(parsed.datacache_config)
}

fn store(
    ctx: &mut StrategyContext<'_>,
    config: Option<&DataCacheConfig>,
    bytes: Vec<u8>,
) -> Result<String, DownloadError> {
    let mut handle = ctx.cache_for(config)?;
    Ok(handle.cache().add(CacheValue::Bytes(bytes))?)
}

/// Reads `file://` resources from the local filesystem into the cache.
#[derive(Debug, Clone)]
pub struct FileDownloadStrategy {
    resource: ResourceConfig,
    cache_config: Option<DataCacheConfig>,
}

impl FileDownloadStrategy {
    pub fn new(resource: ResourceConfig) -> Result<Self, StrategyError> {
        let cache_config = cache_config(&resource)?;
        Ok(Self {
            resource,
            cache_config,
        })
    }
}

impl Strategy for FileDownloadStrategy {
    #[instrument(skip_all, name = "file_download")]
    fn get(
        &self,
        ctx: &mut StrategyContext<'_>,
        _session: Option<&Session>,
    ) -> Result<SessionUpdate, StrategyError> {
        let url = self.resource.url()?;
        let path = url
            .to_file_path()
            .map_err(|_| DownloadError::NotAFilePath(url.to_string()))?;
        let bytes = fs::read(&path).map_err(|source| DownloadError::Io {
            path: path.clone(),
            source,
        })?;
        info!("Read {} bytes from {:?}", bytes.len(), path);
        let key = store(ctx, self.cache_config.as_ref(), bytes)?;
        Ok(SessionUpdate::new().with("key", key))
    }
}

/// Fetches `http(s)://` resources with a blocking GET into the cache.
#[derive(Debug, Clone)]
pub struct HttpDownloadStrategy {
    resource: ResourceConfig,
    cache_config: Option<DataCacheConfig>,
}

impl HttpDownloadStrategy {
    pub fn new(resource: ResourceConfig) -> Result<Self, StrategyError> {
        let cache_config = cache_config(&resource)?;
        Ok(Self {
            resource,
            cache_config,
        })
    }
}

impl Strategy for HttpDownloadStrategy {
    #[instrument(skip_all, name = "http_download")]
    fn get(
        &self,
        ctx: &mut StrategyContext<'_>,
        _session: Option<&Session>,
    ) -> Result<SessionUpdate, StrategyError> {
        let url = self.resource.url()?;
        let http_err = |source| DownloadError::Http {
            url: url.to_string(),
            source,
        };
        let bytes = reqwest::blocking::get(url.clone())
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes())
            .map_err(http_err)?;
        info!("Downloaded {} bytes from {}", bytes.len(), url);
        let key = store(ctx, self.cache_config.as_ref(), bytes.to_vec())?;
        Ok(SessionUpdate::new().with("key", key))
    }
}
