use crate::cli::RunArgs;
use crate::commands::open_cache;
use crate::config::PartialPipelineConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::StepSpinner;
use asmod::store::collection::CollectionStore;
use asmod::strategies::registry::StrategyRegistry;
use asmod::workflows::pipeline;
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::info;

pub fn run(args: RunArgs, quiet: bool) -> Result<()> {
    let partial_config = PartialPipelineConfig::from_file(&args.config)?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    let mut cache = open_cache(config.cache_dir.as_deref())?;
    let mut collections = CollectionStore::new();
    let registry = StrategyRegistry::with_defaults();

    let spinner = StepSpinner::new(quiet);
    spinner.start("Running parse and map pipeline...");
    let result = match pipeline::run(
        &config.pipeline,
        &registry,
        cache.as_mut(),
        &mut collections,
    ) {
        Ok(result) => result,
        Err(e) => {
            spinner.abandon();
            return Err(e.into());
        }
    };
    spinner.finish("Pipeline complete");

    let collection = collections
        .get(&result.collection_id)
        .map_err(|e| CliError::Other(e.into()))?;
    info!(
        "Writing collection {} ({} entries) to {:?}",
        result.collection_id,
        collection.len(),
        &config.output
    );
    let mut writer = BufWriter::new(File::create(&config.output)?);
    serde_json::to_writer_pretty(&mut writer, collection)?;
    writeln!(writer)?;
    writer.flush()?;

    println!(
        "✓ Collection {} written to: {}",
        result.collection_id,
        config.output.display()
    );
    Ok(())
}
