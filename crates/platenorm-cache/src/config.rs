//! Cache configuration.

use platenorm_core::Normalization;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a strategy's artifacts live and which strategy computes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory shared by all strategies.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub strategy: Normalization,
    /// Subdirectory for this strategy; defaults to the strategy's own name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_dir: Option<String>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".platenorm").join("cache")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            strategy: Normalization::default(),
            param_dir: None,
        }
    }
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>, strategy: Normalization) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            strategy,
            param_dir: None,
        }
    }

    pub fn with_param_dir(mut self, param_dir: impl Into<String>) -> Self {
        self.param_dir = Some(param_dir.into());
        self
    }

    /// The directory owned by this strategy instance.
    pub fn strategy_dir(&self) -> PathBuf {
        let sub = self
            .param_dir
            .as_deref()
            .unwrap_or_else(|| self.strategy.default_param_dir());
        self.cache_dir.join(sub)
    }
}
