use crate::config::model::Config;
use anyhow::{Context, Result};

/// Resolves the configuration file path from the `CONFIG_PATH` environment
/// variable, falling back to `config.toml` in the working directory.
pub fn get_config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_config() -> Result<Config> {
    load_config_from_path(&get_config_path())
}

pub fn load_config_from_path(config_path: &str) -> Result<Config> {
    let config_str = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config file: {}", config_path))?;
    let mut config: Config = toml::from_str(&config_str)
        .with_context(|| format!("failed to parse config file: {}", config_path))?;
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// `LB_HOST` and `LB_PORT` override the file values, matching the
/// deployment glue this service is usually launched from.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(host) = std::env::var("LB_HOST") {
        config.host = host;
    }
    if let Ok(port) = std::env::var("LB_PORT") {
        if let Ok(port) = port.parse() {
            config.port = port;
        }
    }
}
