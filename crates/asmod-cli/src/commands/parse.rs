use crate::cli::ParseArgs;
use crate::commands::open_cache;
use crate::error::Result;
use crate::utils::progress::StepSpinner;
use asmod::strategies::registry::StrategyRegistry;
use asmod::workflows::pipeline;
use tracing::info;

pub fn run(args: ParseArgs, quiet: bool) -> Result<()> {
    let resource = args.resource.to_resource()?;
    let mut cache = open_cache(args.resource.cache_dir.as_deref())?;
    let registry = StrategyRegistry::with_defaults();

    let spinner = StepSpinner::new(quiet);
    spinner.start("Parsing structure...");
    let key = match pipeline::parse(&resource, &registry, cache.as_mut()) {
        Ok(key) => key,
        Err(e) => {
            spinner.abandon();
            return Err(e.into());
        }
    };
    let structure = cache.get_structure(&key)?;
    spinner.finish(&format!(
        "Parsed {} ({} atoms)",
        structure.chemical_formula(),
        structure.len()
    ));
    info!("Structure stored under cache key {}", key);

    println!("{}", key);
    Ok(())
}
