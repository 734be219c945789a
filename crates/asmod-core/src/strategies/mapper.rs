use super::Strategy;
use super::config::{FunctionConfig, StructureMapperConfig};
use super::context::StrategyContext;
use super::error::StrategyError;
use super::session::{Session, SessionUpdate};
use crate::store::resolver::SchemaResolver;
use tracing::{debug, info, instrument};

/// Maps a cached structure onto an instance of the configured data model and
/// adds it to the session's collection.
#[derive(Debug, Clone)]
pub struct StructureMapperStrategy {
    config: StructureMapperConfig,
}

impl StructureMapperStrategy {
    pub fn new(config: StructureMapperConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn from_function(function: &FunctionConfig) -> Result<Self, StrategyError> {
        Ok(Self {
            config: StructureMapperConfig::from_function(function)?,
        })
    }

    pub fn config(&self) -> &StructureMapperConfig {
        &self.config
    }
}

impl Strategy for StructureMapperStrategy {
    #[instrument(skip_all, name = "structure_mapper")]
    fn get(
        &self,
        ctx: &mut StrategyContext<'_>,
        session: Option<&Session>,
    ) -> Result<SessionUpdate, StrategyError> {
        let session =
            session.ok_or_else(|| StrategyError::MissingSession("no session given".into()))?;
        let collection_id = session.get_str("collection_id").ok_or_else(|| {
            StrategyError::MissingSession("session has no 'collection_id'".into())
        })?;

        let entity = SchemaResolver::new(self.config.storage_paths.clone())
            .resolve(&self.config.datamodel)?;
        debug!("Resolved data model '{}'", entity.uri);

        let structure = {
            let mut handle = ctx.cache_for(self.config.datacache_config.as_ref())?;
            handle.cache().get_structure(&self.config.datacache_key)?
        };

        let mut instance = entity.instantiate(&[structure.len(), 3], Some(&self.config.label))?;
        instance.set("symbols", structure.symbols().to_vec())?;
        instance.set("masses", structure.masses().to_vec())?;
        instance.set("positions", structure.flat_positions())?;
        instance.set("groundstate_energy", 0.0)?;

        ctx.collections
            .get_mut(collection_id)?
            .add(&self.config.label, instance)?;
        info!(
            "Added '{}' ({} atoms) to collection {}",
            self.config.label,
            structure.len(),
            collection_id
        );

        Ok(SessionUpdate::new().with("collection_id", collection_id))
    }
}
