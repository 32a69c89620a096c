//! Cross-plate column mask derivation.

use crate::cache::ParamCache;
use crate::error::{CacheError, CacheResult};
use platenorm_core::{ColumnMask, ControlMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};

impl ParamCache {
    /// Rebuild the column mask from the persisted parameters of every plate in
    /// `controls`, persist it and make it the in-memory mask.
    ///
    /// A column is kept only if it is non-degenerate on every plate that had
    /// control observations. Plates with null parameters are skipped.
    #[instrument(skip_all, fields(strategy = %self.strategy(), plates = controls.len()))]
    pub fn derive_colmask(&self, controls: &ControlMap) -> CacheResult<Arc<ColumnMask>> {
        let mut mask: Option<ColumnMask> = None;
        let mut contributing = 0usize;

        for plate in controls.plates() {
            let params = self.load_params(plate)?;
            if params.is_null() {
                debug!(plate = %plate, "null parameters, not part of the mask");
                continue;
            }
            let usable = ColumnMask::from_degenerate(&self.strategy().is_degenerate(&params));
            mask = Some(match mask.take() {
                None => usable,
                Some(mut acc) => {
                    acc.intersect(&usable)?;
                    acc
                }
            });
            contributing += 1;
        }

        let mask = mask.ok_or(CacheError::NoContributingPlates)?;
        self.write_colmask(&mask, contributing)?;
        info!(
            contributing,
            kept = mask.kept(),
            dropped = mask.len() - mask.kept(),
            "derived column mask"
        );
        Ok(self.set_colmask(mask))
    }
}
