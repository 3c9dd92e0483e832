//! Configuration file discovery and loading

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use heal_locator::HealingConfig;
use tokio::fs;
use tracing::info;

/// Project-local configuration, checked before the user config directory
pub const LOCAL_CONFIG_PATH: &str = "config/selfheal.yaml";

pub struct LoadedConfig {
    pub config: HealingConfig,

    /// File the configuration came from; `None` when defaults are in use
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    pub fn source(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in defaults".to_string())
    }
}

/// `<config_dir>/selfheal/config.yaml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push("selfheal");
        path.push("config.yaml");
        path
    })
}

/// First existing file among the explicit path, `./config/selfheal.yaml`
/// and the user config directory
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(LOCAL_CONFIG_PATH);
    if local.exists() {
        return Ok(Some(local));
    }
    Ok(user_config_path().filter(|path| path.exists()))
}

pub async fn read_config_file(path: &Path) -> Result<HealingConfig> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    HealingConfig::from_yaml_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

pub async fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedConfig> {
    match resolve_config_path(explicit.map(PathBuf::as_path))? {
        Some(path) => {
            let config = read_config_file(&path).await?;
            info!("Loaded configuration from: {}", path.display());
            Ok(LoadedConfig {
                config,
                path: Some(path),
            })
        }
        None => {
            info!("No config file found, using defaults");
            Ok(LoadedConfig {
                config: HealingConfig::default(),
                path: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heal_locator::StrategyKind;
    use std::io::Write;

    #[tokio::test]
    async fn test_explicit_path_is_loaded_and_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "strategies:\n  - strategy: text\n    fuzzy_limit: 2\n  - strategy: css\nmax_attempts: 4"
        )
        .unwrap();
        let path = file.path().to_path_buf();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.max_attempts, 4);
        assert_eq!(
            loaded.config.strategy_order(),
            vec![StrategyKind::Text, StrategyKind::Css]
        );
        assert_eq!(loaded.config.timeout_ms, 30_000);
    }

    #[tokio::test]
    async fn test_missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(load_config(Some(&missing)).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "confidence_threshold: 1.5").unwrap();
        let err = read_config_file(file.path()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("confidence_threshold"));
    }
}
