use crate::cli::{ResourceArgs, RunArgs};
use crate::error::{CliError, Result};
use asmod::core::io::format::FileFormat;
use asmod::strategies::config::{FunctionConfig, ResourceConfig};
use asmod::workflows::pipeline::PipelineConfig;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAPPER_FUNCTION_TYPE: &str = "asedlite/atoms";

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialResourceConfig {
    download_url: Option<String>,
    media_type: Option<String>,
    format: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialCacheConfig {
    dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMapperConfig {
    datamodel: Option<String>,
    label: Option<String>,
    #[serde(default)]
    storage_paths: Vec<PathBuf>,
}

/// The pipeline file as written by the user; every field is optional until
/// merged with the command line.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialPipelineConfig {
    resource: Option<PartialResourceConfig>,
    cache: Option<PartialCacheConfig>,
    mapper: Option<PartialMapperConfig>,
    /// Directory relative paths in the file are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

/// A fully merged configuration for the `run` command.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub cache_dir: Option<PathBuf>,
    pub output: PathBuf,
}

/// Turns a url or local path into a url string. Local paths become `file://` urls.
pub fn resolve_url(url_or_path: &str) -> Result<String> {
    if let Ok(url) = reqwest::Url::parse(url_or_path) {
        // Single-letter schemes are Windows drive letters, not urls.
        if url.scheme().len() > 1 {
            return Ok(url.to_string());
        }
    }
    let path = std::fs::canonicalize(url_or_path).map_err(|e| {
        CliError::Argument(format!("Cannot resolve input '{}': {}", url_or_path, e))
    })?;
    reqwest::Url::from_file_path(&path)
        .map(|url| url.to_string())
        .map_err(|_| CliError::Argument(format!("Not an absolute path: {:?}", path)))
}

/// Builds the resource for the parse strategy. The media type falls back to
/// the one implied by the format, then by the file name.
pub fn build_resource(
    url_or_path: &str,
    media_type: Option<&str>,
    format: Option<&str>,
    cache_dir: Option<&Path>,
) -> Result<ResourceConfig> {
    let url = resolve_url(url_or_path)?;
    let media_type = match media_type {
        Some(media_type) => media_type.to_string(),
        None => {
            let detected = match format {
                Some(format) => format.parse::<FileFormat>(),
                None => FileFormat::detect(None, url_or_path, None),
            }
            .map_err(|e| {
                CliError::Config(format!(
                    "No media type given and none could be derived: {}",
                    e
                ))
            })?;
            debug!("Derived media type {} for {}", detected.media_type(), url);
            detected.media_type().to_string()
        }
    };

    let mut resource = ResourceConfig::new(url, media_type);
    if let Some(format) = format {
        resource = resource.with_configuration("fileformat", format);
    }
    if let Some(dir) = cache_dir {
        resource = resource.with_configuration("datacache_config", json!({ "cacheDir": dir }));
    }
    Ok(resource)
}

impl PartialPipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading pipeline configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    fn resolve_relative(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn merge_with_cli(mut self, args: &RunArgs) -> Result<AppConfig> {
        self.apply_set_values(&args.set_values)?;

        let resource_file = self.resource.take().unwrap_or_default();
        let cache_file = self.cache.take().unwrap_or_default();
        let mapper_file = self.mapper.take().unwrap_or_default();
        let cli = &args.resource;

        let url = match (&cli.url, &resource_file.download_url) {
            (Some(url), _) => url.clone(),
            // Relative paths in the file are relative to the file itself.
            (None, Some(url)) if reqwest::Url::parse(url).is_err() => self
                .resolve_relative(Path::new(url))
                .to_string_lossy()
                .into_owned(),
            (None, Some(url)) => url.clone(),
            (None, None) => {
                return Err(CliError::Config(
                    "A value for 'resource.download-url' is required either in the config file or via --url.".to_string(),
                ));
            }
        };

        let cache_dir = cli
            .cache_dir
            .clone()
            .or_else(|| cache_file.dir.as_deref().map(|d| self.resolve_relative(d)));

        let resource = build_resource(
            &url,
            cli.media_type.as_deref().or(resource_file.media_type.as_deref()),
            cli.format.as_deref().or(resource_file.format.as_deref()),
            cache_dir.as_deref(),
        )?;

        let label = args
            .label
            .clone()
            .or(mapper_file.label)
            .ok_or_else(|| {
                CliError::Config(
                    "A value for 'mapper.label' is required either in the config file or via --label."
                        .to_string(),
                )
            })?;

        let mut storage_paths: Vec<PathBuf> = mapper_file
            .storage_paths
            .iter()
            .map(|p| self.resolve_relative(p))
            .collect();
        storage_paths.extend(args.storage_paths.iter().cloned());

        let mut function = FunctionConfig::new(MAPPER_FUNCTION_TYPE)
            .with_configuration("label", label)
            .with_configuration("storage_paths", json!(storage_paths));
        if let Some(datamodel) = args.datamodel.clone().or(mapper_file.datamodel) {
            function = function.with_configuration("datamodel", datamodel);
        }
        if let Some(dir) = &cache_dir {
            function = function.with_configuration("datacache_config", json!({ "cacheDir": dir }));
        }

        Ok(AppConfig {
            pipeline: PipelineConfig { resource, function },
            cache_dir,
            output: args.output.clone(),
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let value = value.to_string();

            match key {
                "resource.download-url" => {
                    self.resource.get_or_insert_with(Default::default).download_url = Some(value);
                }
                "resource.media-type" => {
                    self.resource.get_or_insert_with(Default::default).media_type = Some(value);
                }
                "resource.format" => {
                    self.resource.get_or_insert_with(Default::default).format = Some(value);
                }
                "cache.dir" => {
                    self.cache.get_or_insert_with(Default::default).dir = Some(value.into());
                }
                "mapper.datamodel" => {
                    self.mapper.get_or_insert_with(Default::default).datamodel = Some(value);
                }
                "mapper.label" => {
                    self.mapper.get_or_insert_with(Default::default).label = Some(value);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ResourceArgs {
    /// Builds the resource for the `parse` command, which takes everything from the command line.
    pub fn to_resource(&self) -> Result<ResourceConfig> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| CliError::Argument("--url is required".to_string()))?;
        build_resource(
            url,
            self.media_type.as_deref(),
            self.format.as_deref(),
            self.cache_dir.as_deref(),
        )
    }
}
