use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "SINTEF Materials and Chemistry",
    version,
    about = "asmod CLI - parse atomistic structure files into a data cache and map them onto entity collections.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a structure file into the data cache and print its cache key.
    Parse(ParseArgs),
    /// Run a parse-and-map pipeline described by a TOML file.
    Run(RunArgs),
}

/// Options describing the structure resource, shared by both subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct ResourceArgs {
    /// Url or local path of the structure file (e.g., Ethane.xyz or https://host/POSCAR).
    #[arg(short, long, value_name = "URL_OR_PATH")]
    pub url: Option<String>,

    /// Media type of the resource (e.g., chemical/x-xyz, chemical/x-vasp).
    /// Derived from the format or file name when omitted.
    #[arg(short, long, value_name = "TYPE")]
    pub media_type: Option<String>,

    /// File format to read with (xyz, extxyz, vasp, poscar), overriding detection.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Directory for a persistent data cache. Entries are kept in memory when omitted.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,
}

/// Arguments for the `parse` subcommand.
#[derive(Args, Debug)]
pub struct ParseArgs {
    #[command(flatten)]
    pub resource: ResourceArgs,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the pipeline configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Path for the output collection in JSON format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    #[command(flatten)]
    pub resource: ResourceArgs,

    /// Override the label the structure is stored under in the collection.
    #[arg(short, long, value_name = "LABEL")]
    pub label: Option<String>,

    /// Override the data model (entity uri or path to an entity JSON file).
    #[arg(long, value_name = "URI_OR_PATH")]
    pub datamodel: Option<String>,

    /// Additional directory to search for entity files. Can be used multiple times.
    #[arg(long = "storage-path", value_name = "PATH")]
    pub storage_paths: Vec<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S mapper.label=ethane
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
