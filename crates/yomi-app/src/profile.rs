use std::fs;
use std::path::Path;

use anyhow::Context;
use yomi_config::Config;

/// Load the config file at `path`, or env-derived defaults if it doesn't exist
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Ok(Config::new());
    }

    tracing::info!("Loading config from {}", path.display());
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = Config::from_json(&data)
        .with_context(|| format!("invalid config in {}", path.display()))?;
    Ok(config)
}

/// Write `config` as pretty JSON, creating parent directories
pub fn save_config(path: &Path, config: &Config) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    tracing::info!("Saved config to {}", path.display());
    Ok(())
}
