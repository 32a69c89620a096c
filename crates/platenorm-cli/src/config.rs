//! Configuration management for the platenorm CLI.

use anyhow::{Context, Result};
use platenorm_cache::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "platenorm.toml";

/// platenorm project configuration.
///
/// Relative paths are resolved against the directory holding the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub precompute: PrecomputeConfig,
    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// JSON file with column names and per-image records.
    #[serde(default = "default_dataset_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecomputeConfig {
    /// Predicate selecting the control images.
    #[serde(default = "default_predicate")]
    pub predicate: String,
    #[serde(default)]
    pub parallel: bool,
}

fn default_dataset_path() -> PathBuf { PathBuf::from("dataset.json") }
fn default_predicate() -> String { "compound=DMSO".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            dataset: DatasetConfig::default(),
            precompute: PrecomputeConfig::default(),
            root: PathBuf::from("."),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
        }
    }
}

impl Default for PrecomputeConfig {
    fn default() -> Self {
        Self {
            predicate: default_predicate(),
            parallel: false,
        }
    }
}

impl Config {
    /// Load `explicit`, or platenorm.toml from the current or parent directories.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(),
        };
        match path {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::debug!("no {} found, using defaults", CONFIG_FILE);
                Ok(Config::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Save config to the specified path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.resolve(&self.dataset.path)
    }

    /// Cache settings with the cache directory resolved.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            cache_dir: self.resolve(&self.cache.cache_dir),
            ..self.cache.clone()
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Find platenorm.toml in current or parent directories.
fn find_config_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use platenorm_core::Normalization;
    use tempfile::TempDir;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.dataset.path, PathBuf::from("dataset.json"));
        assert_eq!(config.precompute.predicate, "compound=DMSO");
        assert!(!config.precompute.parallel);
    }

    #[test]
    fn parses_sections() {
        let config: Config = toml::from_str(
            r#"
            [cache]
            cache_dir = "/srv/cache"
            strategy = "robust_linear"
            param_dir = "linear_dmso"

            [dataset]
            path = "screens/run1.json"

            [precompute]
            predicate = "role=control"
            parallel = true
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.strategy, Normalization::RobustLinear);
        assert_eq!(
            config.cache_config().strategy_dir(),
            PathBuf::from("/srv/cache/linear_dmso")
        );
        assert_eq!(config.precompute.predicate, "role=control");
        assert!(config.precompute.parallel);
    }

    #[test]
    fn relative_paths_follow_config_location() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        Config::default().save(&path).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.dataset_path(), dir.path().join("dataset.json"));
        assert_eq!(
            config.cache_config().strategy_dir(),
            dir.path().join(".platenorm/cache/robust_std")
        );
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
