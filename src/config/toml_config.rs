use anyhow::{Context, Result};
use std::path::Path;
use crate::config::Config;

/// Load config from a TOML file path. Returns default config if file doesn't exist.
pub fn load_toml_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Load config from the default location (mysql-indexer.toml) or INDEXER_CONFIG_FILE env var.
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var("INDEXER_CONFIG_FILE")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("mysql-indexer.toml"));
    load_toml_config(&path)
}
