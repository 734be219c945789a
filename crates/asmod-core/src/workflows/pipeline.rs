use crate::store::cache::DataCache;
use crate::store::collection::CollectionStore;
use crate::strategies::config::{FunctionConfig, ResourceConfig};
use crate::strategies::context::StrategyContext;
use crate::strategies::error::StrategyError;
use crate::strategies::registry::{StrategyKind, StrategyRegistry};
use crate::strategies::session::Session;
use tracing::{info, instrument, warn};

const DATACACHE_CONFIG: &str = "datacache_config";

/// A two-step pipeline: a resource to parse and a function mapping the result.
///
/// The function's `datacacheKey` is filled in from the parse step.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub resource: ResourceConfig,
    pub function: FunctionConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub atoms_key: String,
    pub collection_id: String,
    pub session: Session,
}

/// Runs the parse strategy registered for the resource's media type and
/// returns the cache key of the parsed structure.
#[instrument(skip_all, name = "parse_workflow")]
pub fn parse(
    resource: &ResourceConfig,
    registry: &StrategyRegistry,
    cache: &mut dyn DataCache,
) -> Result<String, StrategyError> {
    let mut collections = CollectionStore::new();
    let mut ctx = StrategyContext::new(registry, cache, &mut collections);
    let mut session = Session::new();
    parse_into_session(resource, &mut ctx, &mut session)
}

fn parse_into_session(
    resource: &ResourceConfig,
    ctx: &mut StrategyContext<'_>,
    session: &mut Session,
) -> Result<String, StrategyError> {
    let strategy = ctx
        .registry
        .create(StrategyKind::MediaType, resource.clone())?;
    let prepared = strategy.initialize(ctx, Some(&*session))?;
    session.update(prepared);
    let update = strategy.get(ctx, Some(&*session))?;
    let key = update
        .get_str("cached_atoms_key")
        .ok_or(StrategyError::IncompleteUpdate {
            strategy: "parse",
            key: "cached_atoms_key",
        })?
        .to_string();
    session.update(update);
    Ok(key)
}

/// Parses the resource, creates a collection and maps the structure into it.
///
/// The function inherits the resource's `datacache_config` unless it sets its
/// own. On failure the collection created for the run is removed again.
#[instrument(skip_all, name = "pipeline_workflow")]
pub fn run(
    config: &PipelineConfig,
    registry: &StrategyRegistry,
    cache: &mut dyn DataCache,
    collections: &mut CollectionStore,
) -> Result<PipelineResult, StrategyError> {
    let collection_id = collections.create();
    let result = run_steps(config, registry, cache, collections, &collection_id);
    if let Err(e) = &result {
        warn!("Pipeline failed, discarding collection {}: {}", collection_id, e);
        collections.remove(&collection_id);
    }
    result
}

fn run_steps(
    config: &PipelineConfig,
    registry: &StrategyRegistry,
    cache: &mut dyn DataCache,
    collections: &mut CollectionStore,
    collection_id: &str,
) -> Result<PipelineResult, StrategyError> {
    let mut session = Session::new();
    session.insert("collection_id", collection_id);

    let mut ctx = StrategyContext::new(registry, cache, collections);
    let atoms_key = parse_into_session(&config.resource, &mut ctx, &mut session)?;
    info!("Structure cached under {}", atoms_key);

    let mut function = config
        .function
        .clone()
        .with_configuration("datacacheKey", atoms_key.as_str());
    if !function.configuration.contains_key(DATACACHE_CONFIG) {
        if let Some(inherited) = config.resource.configuration.get(DATACACHE_CONFIG) {
            function = function.with_configuration(DATACACHE_CONFIG, inherited.clone());
        }
    }
    let mapper = registry.create(StrategyKind::FunctionType, function)?;
    let prepared = mapper.initialize(&mut ctx, Some(&session))?;
    session.update(prepared);
    let update = mapper.get(&mut ctx, Some(&session))?;
    session.update(update);
    info!("Pipeline finished, collection {}", collection_id);

    Ok(PipelineResult {
        atoms_key,
        collection_id: collection_id.to_string(),
        session,
    })
}
