//! Seams to the external collaborators: control-well lookup and feature loading.
//!
//! Implementations are passed explicitly to the cache; nothing here reaches
//! for process-wide state.

use crate::error::NormResult;
use crate::types::{ControlMap, ImageKey, LoadedFeatures};

/// Resolves a control-selection predicate to control images grouped by plate.
pub trait ControlResolver: Send + Sync {
    /// Name of this backend, for logs.
    fn name(&self) -> &str;

    /// Map every plate with matching images to its control image keys.
    ///
    /// The predicate is opaque to the caller and interpreted by the backend.
    fn resolve(&self, predicate: &str) -> NormResult<ControlMap>;
}

/// Loads raw feature rows for image keys.
pub trait FeatureSource: Send + Sync {
    /// Full, unmasked feature column names, in matrix column order.
    fn colnames(&self) -> &[String];

    /// Load the feature rows for `keys`.
    ///
    /// The returned matrix always has `colnames().len()` columns, even when
    /// no rows were found.
    fn load(&self, keys: &[ImageKey]) -> NormResult<LoadedFeatures>;

    /// Number of feature columns.
    fn feature_count(&self) -> usize {
        self.colnames().len()
    }
}
