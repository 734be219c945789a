use super::Strategy;
use super::config::{ConfigError, FunctionConfig, ResourceConfig};
use super::download::{FileDownloadStrategy, HttpDownloadStrategy};
use super::error::StrategyError;
use super::mapper::StructureMapperStrategy;
use super::parse::AtomisticParseStrategy;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};

/// The capability a strategy is registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Download strategies, keyed by url scheme.
    Scheme,
    /// Parse strategies, keyed by media type.
    MediaType,
    /// Function strategies, keyed by function type.
    FunctionType,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheme => write!(f, "scheme"),
            Self::MediaType => write!(f, "mediaType"),
            Self::FunctionType => write!(f, "functionType"),
        }
    }
}

/// The configuration a strategy is constructed from.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    Resource(ResourceConfig),
    Function(FunctionConfig),
}

impl StrategyConfig {
    /// The registry value this configuration selects for `kind`.
    fn capability(&self, kind: StrategyKind) -> Result<String, ConfigError> {
        match (kind, self) {
            (StrategyKind::Scheme, Self::Resource(resource)) => Ok(resource.url()?.scheme().to_string()),
            (StrategyKind::MediaType, Self::Resource(resource)) => {
                Ok(resource.media_type()?.trim().to_ascii_lowercase())
            }
            (StrategyKind::FunctionType, Self::Function(function)) => {
                Ok(function.function_type.trim().to_string())
            }
            (StrategyKind::FunctionType, Self::Resource(_)) => {
                Err(ConfigError::WrongKind { expected: "function" })
            }
            (_, Self::Function(_)) => Err(ConfigError::WrongKind { expected: "resource" }),
        }
    }

    pub fn into_resource(self) -> Result<ResourceConfig, ConfigError> {
        match self {
            Self::Resource(resource) => Ok(resource),
            Self::Function(_) => Err(ConfigError::WrongKind { expected: "resource" }),
        }
    }

    pub fn into_function(self) -> Result<FunctionConfig, ConfigError> {
        match self {
            Self::Function(function) => Ok(function),
            Self::Resource(_) => Err(ConfigError::WrongKind { expected: "function" }),
        }
    }
}

impl From<ResourceConfig> for StrategyConfig {
    fn from(resource: ResourceConfig) -> Self {
        Self::Resource(resource)
    }
}

impl From<FunctionConfig> for StrategyConfig {
    fn from(function: FunctionConfig) -> Self {
        Self::Function(function)
    }
}

pub type StrategyConstructor = fn(StrategyConfig) -> Result<Box<dyn Strategy>, StrategyError>;

fn build_file_download(config: StrategyConfig) -> Result<Box<dyn Strategy>, StrategyError> {
    Ok(Box::new(FileDownloadStrategy::new(config.into_resource()?)?))
}

fn build_http_download(config: StrategyConfig) -> Result<Box<dyn Strategy>, StrategyError> {
    Ok(Box::new(HttpDownloadStrategy::new(config.into_resource()?)?))
}

fn build_parse(config: StrategyConfig) -> Result<Box<dyn Strategy>, StrategyError> {
    Ok(Box::new(AtomisticParseStrategy::new(config.into_resource()?)?))
}

fn build_mapper(config: StrategyConfig) -> Result<Box<dyn Strategy>, StrategyError> {
    Ok(Box::new(StructureMapperStrategy::from_function(
        &config.into_function()?,
    )?))
}

/// Maps `(kind, value)` pairs to strategy constructors.
#[derive(Debug, Default, Clone)]
pub struct StrategyRegistry {
    constructors: HashMap<(StrategyKind, String), StrategyConstructor>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every strategy in this crate registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(StrategyKind::Scheme, "file", build_file_download);
        registry.register(StrategyKind::Scheme, "http", build_http_download);
        registry.register(StrategyKind::Scheme, "https", build_http_download);
        registry.register(StrategyKind::MediaType, "chemical/x-xyz", build_parse);
        registry.register(StrategyKind::MediaType, "chemical/x-vasp", build_parse);
        registry.register(StrategyKind::FunctionType, "asedlite/atoms", build_mapper);
        debug!(
            "Strategy registry initialized with {} entries",
            registry.constructors.len()
        );
        registry
    }

    /// Registers `constructor` for `(kind, value)`, replacing any previous entry.
    pub fn register(
        &mut self,
        kind: StrategyKind,
        value: impl Into<String>,
        constructor: StrategyConstructor,
    ) {
        let value = value.into();
        trace!("Registering {} strategy for '{}'", kind, value);
        self.constructors.insert((kind, value), constructor);
    }

    pub fn contains(&self, kind: StrategyKind, value: &str) -> bool {
        self.constructors.contains_key(&(kind, value.to_string()))
    }

    /// Builds the strategy registered for the value `config` selects under `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::NotRegistered`] when no constructor matches, or
    /// whatever the constructor reports for an invalid configuration.
    pub fn create(
        &self,
        kind: StrategyKind,
        config: impl Into<StrategyConfig>,
    ) -> Result<Box<dyn Strategy>, StrategyError> {
        let config = config.into();
        let value = config.capability(kind)?;
        let constructor = self
            .constructors
            .get(&(kind, value.clone()))
            .ok_or(StrategyError::NotRegistered { kind, value })?;
        constructor(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cache::MemoryCache;
    use crate::store::collection::CollectionStore;
    use crate::strategies::context::StrategyContext;
    use crate::strategies::session::{Session, SessionUpdate};

    struct Echo;

    impl Strategy for Echo {
        fn get(
            &self,
            _ctx: &mut StrategyContext<'_>,
            _session: Option<&Session>,
        ) -> Result<SessionUpdate, StrategyError> {
            Ok(SessionUpdate::new().with("echo", true))
        }
    }

    fn build_echo(_config: StrategyConfig) -> Result<Box<dyn Strategy>, StrategyError> {
        Ok(Box::new(Echo))
    }

    #[test]
    fn defaults_cover_all_builtin_strategies() {
        let registry = StrategyRegistry::with_defaults();
        for scheme in ["file", "http", "https"] {
            assert!(registry.contains(StrategyKind::Scheme, scheme));
        }
        assert!(registry.contains(StrategyKind::MediaType, "chemical/x-xyz"));
        assert!(registry.contains(StrategyKind::MediaType, "chemical/x-vasp"));
        assert!(registry.contains(StrategyKind::FunctionType, "asedlite/atoms"));
    }

    #[test]
    fn media_type_lookup_is_case_insensitive() {
        let registry = StrategyRegistry::with_defaults();
        let resource = ResourceConfig::new("file:///tmp/x.xyz", "Chemical/X-XYZ");
        assert!(registry.create(StrategyKind::MediaType, resource).is_ok());
    }

    #[test]
    fn unknown_media_type_is_not_registered() {
        let registry = StrategyRegistry::with_defaults();
        let resource = ResourceConfig::new("file:///tmp/x.cif", "chemical/x-cif");
        assert!(matches!(
            registry.create(StrategyKind::MediaType, resource),
            Err(StrategyError::NotRegistered { kind: StrategyKind::MediaType, .. })
        ));
    }

    #[test]
    fn mismatched_config_kind_is_a_config_error() {
        let registry = StrategyRegistry::with_defaults();
        assert!(matches!(
            registry.create(StrategyKind::MediaType, FunctionConfig::new("asedlite/atoms")),
            Err(StrategyError::Config {
                source: ConfigError::WrongKind { expected: "resource" }
            })
        ));
    }

    #[test]
    fn mapper_construction_validates_configuration() {
        let registry = StrategyRegistry::with_defaults();
        let function = FunctionConfig::new("asedlite/atoms")
            .with_configuration("label", "")
            .with_configuration("datacacheKey", "abc");
        assert!(matches!(
            registry.create(StrategyKind::FunctionType, function),
            Err(StrategyError::Config {
                source: ConfigError::EmptyField("label")
            })
        ));
    }

    #[test]
    fn custom_strategies_can_be_registered() {
        let mut registry = StrategyRegistry::new();
        registry.register(StrategyKind::FunctionType, "test/echo", build_echo);
        let strategy = registry
            .create(StrategyKind::FunctionType, FunctionConfig::new("test/echo"))
            .unwrap();

        let mut cache = MemoryCache::new();
        let mut collections = CollectionStore::new();
        let mut ctx = StrategyContext::new(&registry, &mut cache, &mut collections);
        assert!(strategy.initialize(&mut ctx, None).unwrap().is_empty());
        let update = strategy.get(&mut ctx, None).unwrap();
        assert_eq!(update.iter().count(), 1);
    }
}
