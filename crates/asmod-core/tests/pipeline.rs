use asmod::core::io::format::FileFormat;
use asmod::core::io::poscar::PoscarFile;
use asmod::core::io::traits::StructureFile;
use asmod::core::io::xyz::XyzFile;
use asmod::store::cache::{CacheValue, DataCache, DirCache, MemoryCache};
use asmod::store::collection::CollectionStore;
use asmod::strategies::Strategy;
use asmod::strategies::config::{FunctionConfig, ResourceConfig, StructureMapperConfig};
use asmod::strategies::context::StrategyContext;
use asmod::strategies::error::StrategyError;
use asmod::strategies::mapper::StructureMapperStrategy;
use asmod::strategies::parse::AtomisticParseStrategy;
use asmod::strategies::registry::{StrategyConfig, StrategyKind, StrategyRegistry};
use asmod::strategies::session::{Session, SessionUpdate};
use asmod::workflows::pipeline::{self, PipelineConfig};
use reqwest::Url;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const ETHANE_SYMBOLS: [&str; 8] = ["H", "C", "H", "H", "C", "H", "H", "H"];

fn testfile(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("testfiles")
        .join(name)
}

fn file_url(path: &Path) -> String {
    Url::from_file_path(path).unwrap().to_string()
}

fn ethane_resource() -> ResourceConfig {
    ResourceConfig::new(file_url(&testfile("Ethane.xyz")), "chemical/x-xyz")
}

fn parse_with(
    registry: &StrategyRegistry,
    cache: &mut dyn DataCache,
    resource: ResourceConfig,
) -> Result<String, StrategyError> {
    let mut collections = CollectionStore::new();
    let mut ctx = StrategyContext::new(registry, cache, &mut collections);
    let strategy = registry.create(StrategyKind::MediaType, resource)?;
    let update = strategy.get(&mut ctx, None)?;
    Ok(update.get_str("cached_atoms_key").unwrap().to_string())
}

#[test]
fn ethane_parses_into_eight_atoms() {
    let registry = StrategyRegistry::with_defaults();
    let mut cache = MemoryCache::new();
    let key = parse_with(&registry, &mut cache, ethane_resource()).unwrap();

    let structure = cache.get_structure(&key).unwrap();
    assert_eq!(structure.symbols(), ETHANE_SYMBOLS);
    assert_eq!(structure.positions().len(), 8);
    assert_eq!(structure.chemical_formula(), "C2H6");
}

#[test]
fn parsed_ethane_matches_direct_read() {
    let registry = StrategyRegistry::with_defaults();
    let mut cache = MemoryCache::new();
    let key = parse_with(&registry, &mut cache, ethane_resource()).unwrap();

    let parsed = cache.get_structure(&key).unwrap();
    let direct = XyzFile::read_from_path(&testfile("Ethane.xyz")).unwrap();
    assert!(parsed.approx_eq(&direct, 1e-12));
}

#[test]
fn write_and_reread_preserves_symbols_and_positions() {
    let dir = tempdir().unwrap();
    for (name, format) in [("Ethane.xyz", FileFormat::Xyz), ("POSCAR", FileFormat::Poscar)] {
        let original = format.read_path(&testfile(name)).unwrap();
        let out = dir.path().join(format!("out-{}", name));
        format.write_path(&original, &out).unwrap();
        let reread = format.read_path(&out).unwrap();
        assert_eq!(reread.symbols(), original.symbols());
        assert!(reread.approx_eq(&original, 1e-6), "{} changed on rewrite", name);
    }
}

#[test]
fn poscar_resource_parses_through_vasp_media_type() {
    let registry = StrategyRegistry::with_defaults();
    let mut cache = MemoryCache::new();
    let resource = ResourceConfig::new(file_url(&testfile("POSCAR")), "chemical/x-vasp");
    let key = parse_with(&registry, &mut cache, resource).unwrap();

    let structure = cache.get_structure(&key).unwrap();
    let direct = PoscarFile::read_from_path(&testfile("POSCAR")).unwrap();
    assert_eq!(structure.len(), 8);
    assert_eq!(structure.pbc(), [true; 3]);
    assert!(structure.approx_eq(&direct, 1e-12));
}

#[test]
fn reparsing_the_same_file_yields_the_same_key() {
    let registry = StrategyRegistry::with_defaults();
    let mut cache = MemoryCache::new();
    let first = parse_with(&registry, &mut cache, ethane_resource()).unwrap();
    let second = parse_with(&registry, &mut cache, ethane_resource()).unwrap();
    assert_eq!(first, second);
    // One raw entry plus one structure.
    assert_eq!(cache.len(), 2);
}

/// Hands out a fixed cache key, standing in for a downloader whose content
/// was already parsed.
struct CachedKeyDownload;

static CACHED_KEY: std::sync::OnceLock<String> = std::sync::OnceLock::new();

impl Strategy for CachedKeyDownload {
    fn get(
        &self,
        _ctx: &mut StrategyContext<'_>,
        _session: Option<&Session>,
    ) -> Result<SessionUpdate, StrategyError> {
        Ok(SessionUpdate::new().with("key", CACHED_KEY.get().cloned().unwrap_or_default()))
    }
}

fn build_cached_key_download(_: StrategyConfig) -> Result<Box<dyn Strategy>, StrategyError> {
    Ok(Box::new(CachedKeyDownload))
}

#[test]
fn already_parsed_content_short_circuits() {
    let mut cache = MemoryCache::new();
    let structure = XyzFile::read_from_path(&testfile("Ethane.xyz")).unwrap();
    let key = cache.add(CacheValue::Structure(structure)).unwrap();
    CACHED_KEY.get_or_init(|| key.clone());

    let mut registry = StrategyRegistry::with_defaults();
    registry.register(StrategyKind::Scheme, "memory", build_cached_key_download);
    let resource = ResourceConfig::new("memory://cache/Ethane.xyz", "chemical/x-xyz");
    let parsed = parse_with(&registry, &mut cache, resource).unwrap();

    assert_eq!(parsed, key);
    assert_eq!(cache.len(), 1);
}

#[test]
fn parse_strategy_reports_empty_initialize() {
    let registry = StrategyRegistry::with_defaults();
    let mut cache = MemoryCache::new();
    let mut collections = CollectionStore::new();
    let mut ctx = StrategyContext::new(&registry, &mut cache, &mut collections);
    let strategy = AtomisticParseStrategy::new(ethane_resource()).unwrap();
    assert!(strategy.initialize(&mut ctx, None).unwrap().is_empty());
}

fn mapper_config(key: &str) -> StructureMapperConfig {
    let mut config = StructureMapperConfig::new("molecule", key);
    config.storage_paths = vec![testfile("")];
    config
}

#[test]
fn ethane_maps_into_collection_as_molecule() {
    let registry = StrategyRegistry::with_defaults();
    let mut cache = MemoryCache::new();
    let key = parse_with(&registry, &mut cache, ethane_resource()).unwrap();

    let mut collections = CollectionStore::new();
    let collection_id = collections.create();
    let mut session = Session::new();
    session.insert("collection_id", collection_id.as_str());

    let mut ctx = StrategyContext::new(&registry, &mut cache, &mut collections);
    let strategy = StructureMapperStrategy::new(mapper_config(&key)).unwrap();
    let update = strategy.get(&mut ctx, Some(&session)).unwrap();
    assert_eq!(update.get_str("collection_id"), Some(collection_id.as_str()));

    let collection = collections.get(&collection_id).unwrap();
    assert_eq!(collection.len(), 1);
    let molecule = collection.get("molecule").unwrap();
    assert_eq!(molecule.meta(), "http://onto-ns.com/meta/0.1/Molecule");
    assert_eq!(molecule.get_strings("symbols").unwrap(), ETHANE_SYMBOLS);
    assert_eq!(molecule.shape("positions").unwrap(), [8, 3]);
    assert_eq!(molecule.get_floats("positions").unwrap().len(), 8 * 3);
    assert_eq!(molecule.get_scalar_float("groundstate_energy"), Some(0.0));
}

#[test]
fn mapper_without_collection_id_leaves_collections_untouched() {
    let registry = StrategyRegistry::with_defaults();
    let mut cache = MemoryCache::new();
    let key = parse_with(&registry, &mut cache, ethane_resource()).unwrap();
    let mut collections = CollectionStore::new();
    let collection_id = collections.create();

    let mut ctx = StrategyContext::new(&registry, &mut cache, &mut collections);
    let strategy = StructureMapperStrategy::new(mapper_config(&key)).unwrap();
    let mut session = Session::new();
    session.insert("other", "value");
    assert!(matches!(
        strategy.get(&mut ctx, Some(&session)),
        Err(StrategyError::MissingSession(_))
    ));
    assert!(collections.get(&collection_id).unwrap().is_empty());
}

#[test]
fn pipeline_workflow_parses_and_maps() {
    let registry = StrategyRegistry::with_defaults();
    let cache_dir = tempdir().unwrap();
    let mut cache = DirCache::open(cache_dir.path()).unwrap();
    let mut collections = CollectionStore::new();

    let function = FunctionConfig::new("asedlite/atoms")
        .with_configuration("label", "molecule")
        .with_configuration("storage_paths", serde_json::json!([testfile("")]));
    let config = PipelineConfig {
        resource: ethane_resource(),
        function,
    };
    let result = pipeline::run(&config, &registry, &mut cache, &mut collections).unwrap();

    assert_eq!(result.session.get_str("cached_atoms_key"), Some(result.atoms_key.as_str()));
    assert!(cache.contains(&result.atoms_key));
    let molecule = collections
        .get(&result.collection_id)
        .unwrap()
        .get("molecule")
        .unwrap();
    assert_eq!(molecule.get_strings("symbols").unwrap().len(), 8);

    let reparsed = pipeline::parse(&ethane_resource(), &registry, &mut cache).unwrap();
    assert_eq!(reparsed, result.atoms_key);
}

fn scratch_resource(dir: &Path, name: &str, content: &str, media_type: &str) -> ResourceConfig {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    ResourceConfig::new(file_url(&path), media_type)
}

#[test]
fn malformed_headers_are_parse_errors() {
    let dir = tempdir().unwrap();
    let registry = StrategyRegistry::with_defaults();
    let cases = [
        ("Huge.xyz", "1000000000000000000\n\nH 0 0 0\n", "chemical/x-xyz"),
        ("Inf.xyz", "1\n\nH inf 0 0\n", "chemical/x-xyz"),
        (
            "POSCAR",
            "x\n1.0\n1 0 0\n0 1 0\n0 0 1\nNa Cl\n18446744073709551615 1\nDirect\n0 0 0\n",
            "chemical/x-vasp",
        ),
    ];
    for (name, content, media_type) in cases {
        let mut cache = MemoryCache::new();
        let resource = scratch_resource(dir.path(), name, content, media_type);
        let result = parse_with(&registry, &mut cache, resource);
        assert!(matches!(result, Err(StrategyError::Parse { .. })), "{}", name);
        // Only the raw download is cached.
        assert_eq!(cache.len(), 1, "{}", name);
    }
}

fn molecule_function() -> FunctionConfig {
    FunctionConfig::new("asedlite/atoms")
        .with_configuration("label", "molecule")
        .with_configuration("storage_paths", serde_json::json!([testfile("")]))
}

#[test]
fn failed_pipeline_removes_its_collection() {
    let registry = StrategyRegistry::with_defaults();
    let mut cache = MemoryCache::new();
    let mut collections = CollectionStore::new();

    let missing_file = PipelineConfig {
        resource: ResourceConfig::new("file:///nonexistent/Ethane.xyz", "chemical/x-xyz"),
        function: molecule_function(),
    };
    assert!(matches!(
        pipeline::run(&missing_file, &registry, &mut cache, &mut collections),
        Err(StrategyError::Download(_))
    ));
    assert!(collections.is_empty());

    let missing_model = PipelineConfig {
        resource: ethane_resource(),
        function: molecule_function().with_configuration("datamodel", "Missing.json"),
    };
    assert!(matches!(
        pipeline::run(&missing_model, &registry, &mut cache, &mut collections),
        Err(StrategyError::SchemaResolution { .. })
    ));
    assert!(collections.is_empty());
}

#[test]
fn pipeline_mapper_inherits_resource_cache_dir() {
    let registry = StrategyRegistry::with_defaults();
    let cache_dir = tempdir().unwrap();
    let mut shared = MemoryCache::new();
    let mut collections = CollectionStore::new();

    let resource = ethane_resource().with_configuration(
        "datacache_config",
        serde_json::json!({"cacheDir": cache_dir.path()}),
    );
    let config = PipelineConfig {
        resource,
        function: molecule_function(),
    };
    let result = pipeline::run(&config, &registry, &mut shared, &mut collections).unwrap();

    assert!(shared.is_empty());
    assert!(DirCache::open(cache_dir.path()).unwrap().contains(&result.atoms_key));
    let collection = collections.get(&result.collection_id).unwrap();
    assert_eq!(
        collection.get("molecule").unwrap().get_strings("symbols").unwrap(),
        ETHANE_SYMBOLS
    );
}
