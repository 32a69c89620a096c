//! Error types for the parameter cache.

use platenorm_core::{NormError, Normalization, PlateId};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, writing or deriving cache artifacts.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No cached parameters for plate {plate} ({path}); run precompute first")]
    NotFound { plate: PlateId, path: PathBuf },

    #[error("No column mask at {0}; run precompute first")]
    MaskNotFound(PathBuf),

    #[error("Corrupt artifact {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Artifact {path} was written by {found}, this cache uses {expected}")]
    StrategyMismatch {
        path: PathBuf,
        expected: Normalization,
        found: Normalization,
    },

    #[error("No plate has control observations; cannot derive a column mask")]
    NoContributingPlates,

    #[error(transparent)]
    Norm(#[from] NormError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> CacheError {
        let path = path.into();
        move |source| CacheError::Io { path, source }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CacheError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
