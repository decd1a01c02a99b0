use anyhow::Result;
use crate::config::Config;
use crate::config::toml_config::load_default_config;
use crate::config::env_config::load_env_config;

/// Load the final merged config:
/// 1. Load dotenv if .env exists
/// 2. Load TOML base config
/// 3. Load env var overrides
/// 4. Apply overrides onto base
/// 5. Validate
pub fn load_config() -> Result<Config> {
    // 1. Load .env if present
    if std::path::Path::new(".env").exists() {
        dotenv::dotenv().ok();
    }

    // 2. TOML base
    let base = load_default_config()?;

    // 3. Env overrides
    let env = load_env_config();

    // 4. Merge
    let config = env.apply_to(base);

    // 5. Reject bad input before anything touches the database
    config.validate()?;

    Ok(config)
}
