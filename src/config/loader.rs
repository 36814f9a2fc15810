use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use eyre::{Result, WrapErr};

use crate::config::models::ServerConfig;

/// Prefix of environment variables overriding file settings, e.g.
/// `KUBEGATE_LISTEN_ADDR` or `KUBEGATE_BACKEND__PORT`.
pub const ENV_PREFIX: &str = "KUBEGATE";

/// Load configuration from a YAML, JSON, TOML or INI file (chosen by extension,
/// YAML when unknown), then apply `KUBEGATE_*` environment overrides.
pub async fn load_config(config_path: &str) -> Result<ServerConfig> {
    let contents = tokio::fs::read_to_string(config_path)
        .await
        .wrap_err_with(|| format!("Failed to read config file {config_path}"))?;

    parse_config(&contents, file_format(Path::new(config_path)))
        .wrap_err_with(|| format!("Invalid configuration in {config_path}"))
}

fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Yaml,
    }
}

fn parse_config(contents: &str, format: FileFormat) -> Result<ServerConfig> {
    let settings = Config::builder()
        .add_source(File::from_str(contents, format))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .wrap_err("Failed to merge configuration sources")?;

    settings
        .try_deserialize()
        .wrap_err("Failed to deserialize configuration")
}
