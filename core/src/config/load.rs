use std::path::{Path, PathBuf};

use anyhow::Context;

use super::types::AppConfig;

/// Default data directory: ~/.planloop
pub fn get_planloop_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(home.join(".planloop"))
}

pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    toml::from_str::<AppConfig>(&s).with_context(|| format!("Invalid config {:?}", path))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    load_config(None)
}

/// Load `explicit` when given, otherwise the first of ~/.planloop/config.toml
/// and ./config.toml that exists, falling back to defaults. The log directory
/// default and environment overrides are applied in every case.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let data_dir = get_planloop_data_dir()?;
    let home_config = data_dir.join("config.toml");
    let local_config = Path::new("config.toml");

    let mut cfg = match explicit {
        Some(path) => load_from_path(path)?,
        None if home_config.exists() => load_from_path(&home_config)?,
        None if local_config.exists() => load_from_path(local_config)?,
        None => AppConfig::default(),
    };

    default_log_directory(&mut cfg, &data_dir);
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

/// File logging without a directory writes under `<data_dir>/logs`.
pub fn default_log_directory(cfg: &mut AppConfig, data_dir: &Path) {
    if cfg.logging.file && cfg.logging.log_dir().is_none() {
        cfg.logging.directory = Some(data_dir.join("logs").to_string_lossy().into_owned());
    }
}

/// Environment overrides win over every file.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("PLANLOOP_PLANS_DIR") {
        cfg.storage.plans_dir = v;
    }
    if let Some(v) = non_empty("PLANLOOP_WORKSPACE") {
        cfg.workspace.root = v;
    }
    if let Some(v) = non_empty("PLANLOOP_LOG_LEVEL") {
        cfg.logging.level = v;
    }
}
