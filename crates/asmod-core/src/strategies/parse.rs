use super::Strategy;
use super::config::{AtomisticParseConfig, ResourceConfig};
use super::context::StrategyContext;
use super::error::StrategyError;
use super::registry::StrategyKind;
use super::session::{Session, SessionUpdate};
use crate::core::io::format::FileFormat;
use crate::store::cache::CacheValue;
use reqwest::Url;
use tracing::{debug, info, instrument};

/// Parses a downloaded structure file into an [`AtomicStructure`] in the cache.
///
/// [`AtomicStructure`]: crate::core::models::structure::AtomicStructure
#[derive(Debug, Clone)]
pub struct AtomisticParseStrategy {
    resource: ResourceConfig,
    config: AtomisticParseConfig,
}

impl AtomisticParseStrategy {
    pub fn new(resource: ResourceConfig) -> Result<Self, StrategyError> {
        let config = AtomisticParseConfig::from_resource(&resource)?;
        Ok(Self { resource, config })
    }

    pub fn config(&self) -> &AtomisticParseConfig {
        &self.config
    }
}

fn file_name(url: &Url) -> &str {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
}

/// Splits the last path segment of `url` into a stem and an extension,
/// e.g. `.../Ethane.xyz` into `("Ethane", "xyz")`.
fn file_name_parts(url: &Url) -> (String, Option<String>) {
    let name = file_name(url);
    let prefix = name.split('.').next().unwrap_or_default().to_string();
    let suffix = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .filter(|ext| !ext.is_empty());
    (prefix, suffix)
}

impl Strategy for AtomisticParseStrategy {
    #[instrument(skip_all, name = "atomistic_parse")]
    fn get(
        &self,
        ctx: &mut StrategyContext<'_>,
        session: Option<&Session>,
    ) -> Result<SessionUpdate, StrategyError> {
        let url = self.resource.url()?;
        let registry = ctx.registry;
        let downloader = registry.create(StrategyKind::Scheme, self.resource.clone())?;
        let download = downloader.get(ctx, session)?;
        let key = download
            .get_str("key")
            .ok_or(StrategyError::IncompleteUpdate {
                strategy: "download",
                key: "key",
            })?
            .to_string();

        let mut handle = ctx.cache_for(self.config.datacache_config.as_ref())?;
        let cache = handle.cache();
        if let CacheValue::Structure(_) = cache.get(&key)? {
            debug!("Cache entry {} already holds a parsed structure", key);
            return Ok(SessionUpdate::new().with("cached_atoms_key", key));
        }

        let (prefix, suffix) = file_name_parts(&url);
        let format = FileFormat::detect(
            self.config.fileformat.as_deref(),
            file_name(&url),
            self.resource.media_type.as_deref(),
        )?;
        debug!("Reading {} as {}", url, format);

        let structure = {
            let file = cache.getfile(&key, suffix.as_deref(), Some(&prefix))?;
            format.read_path(file.path())?
        };
        info!(
            "Parsed {} atoms ({}) from {}",
            structure.len(),
            structure.chemical_formula(),
            url
        );

        let atoms_key = cache.add(CacheValue::Structure(structure))?;
        Ok(SessionUpdate::new().with("cached_atoms_key", atoms_key))
    }
}
