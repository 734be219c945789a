use crate::error::{CliError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::LevelFilter, fmt, prelude::*};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

const LOG_ENV_VAR: &str = "ASMOD_LOG";

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// `ASMOD_LOG` directives, when set, take precedence over the verbosity flags.
fn env_filter(verbosity: u8, quiet: bool) -> Result<EnvFilter> {
    EnvFilter::builder()
        .with_default_directive(level_filter(verbosity, quiet).into())
        .with_env_var(LOG_ENV_VAR)
        .from_env()
        .map_err(|e| CliError::Argument(format!("Invalid {} directive: {}", LOG_ENV_VAR, e)))
}

/// Plain-text layer recording every event, with its target, into `path`.
fn file_layer(path: &Path) -> Result<BoxedLayer> {
    let file = File::create(path)?;
    Ok(fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .boxed())
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let file = log_file.as_deref().map(file_layer).transpose()?;
    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    // The file layer sits directly on the registry; the env filter still applies to it.
    tracing_subscriber::registry()
        .with(file)
        .with(env_filter(verbosity, quiet)?)
        .with(stderr)
        .init();
    Ok(())
}
