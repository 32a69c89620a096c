//! The per-strategy parameter cache.

use crate::artifact::{self, MaskFile, ParamsFile, EXTENSION};
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use ndarray::{Array2, ArrayView2};
use platenorm_core::{output_columns, ColumnMask, FeatureSource, Normalization, Params, PlateId};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

const PARAMS_SUBDIR: &str = "params";
const COLMASK_FILE: &str = "colmask.json";

/// Parameter artifacts of one normalization strategy, keyed by plate.
///
/// Layout under [`dir`](Self::dir):
///
/// ```text
/// colmask.json
/// params/<plate>.json
/// ```
///
/// The instance owns its directory. The column mask is read from disk at most
/// once and then served from memory until [`precompute`](Self::precompute)
/// replaces it or [`invalidate_colmask`](Self::invalidate_colmask) drops it.
#[derive(Debug)]
pub struct ParamCache {
    strategy: Normalization,
    dir: PathBuf,
    colmask: RwLock<Option<Arc<ColumnMask>>>,
}

impl ParamCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::open(config.strategy_dir(), config.strategy)
    }

    /// Use `dir` as the strategy directory directly.
    pub fn open(dir: impl Into<PathBuf>, strategy: Normalization) -> Self {
        Self {
            strategy,
            dir: dir.into(),
            colmask: RwLock::new(None),
        }
    }

    pub fn strategy(&self) -> Normalization {
        self.strategy
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn params_dir(&self) -> PathBuf {
        self.dir.join(PARAMS_SUBDIR)
    }

    pub fn colmask_path(&self) -> PathBuf {
        self.dir.join(COLMASK_FILE)
    }

    pub fn params_path(&self, plate: &PlateId) -> CacheResult<PathBuf> {
        let stem = plate.file_stem()?;
        Ok(self.params_dir().join(format!("{}.{}", stem, EXTENSION)))
    }

    pub fn has_params(&self, plate: &PlateId) -> CacheResult<bool> {
        Ok(self.params_path(plate)?.is_file())
    }

    pub fn load_params(&self, plate: &PlateId) -> CacheResult<Params> {
        let path = self.params_path(plate)?;
        match artifact::read_json::<ParamsFile>(&path)? {
            Some(file) => {
                if file.plate != *plate {
                    return Err(CacheError::corrupt(
                        &path,
                        format!("holds parameters of plate {}", file.plate),
                    ));
                }
                file.into_params(self.strategy, &path)
            }
            None => Err(CacheError::NotFound {
                plate: plate.clone(),
                path,
            }),
        }
    }

    /// Persist `params` for `plate`, replacing any earlier artifact.
    pub fn save_params(&self, plate: &PlateId, params: &Params) -> CacheResult<()> {
        let path = self.params_path(plate)?;
        artifact::write_json(&path, &ParamsFile::new(self.strategy, plate, params))?;
        debug!(plate = %plate, path = %path.display(), "saved parameters");
        Ok(())
    }

    /// Read the persisted column mask, bypassing the in-memory copy.
    pub fn read_colmask(&self) -> CacheResult<ColumnMask> {
        let path = self.colmask_path();
        match artifact::read_json::<MaskFile>(&path)? {
            Some(file) => file.into_mask(self.strategy, &path),
            None => Err(CacheError::MaskNotFound(path)),
        }
    }

    pub(crate) fn write_colmask(&self, mask: &ColumnMask, contributing: usize) -> CacheResult<()> {
        let path = self.colmask_path();
        artifact::write_json(&path, &MaskFile::new(self.strategy, contributing, mask))
    }

    /// The column mask, loaded from disk on first use.
    pub fn colmask(&self) -> CacheResult<Arc<ColumnMask>> {
        if let Some(mask) = self
            .colmask
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(mask));
        }

        let mut slot = self.colmask.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(mask) = slot.as_ref() {
            return Ok(Arc::clone(mask));
        }
        let mask = Arc::new(self.read_colmask()?);
        debug!(kept = mask.kept(), columns = mask.len(), "loaded column mask");
        *slot = Some(Arc::clone(&mask));
        Ok(mask)
    }

    pub(crate) fn set_colmask(&self, mask: ColumnMask) -> Arc<ColumnMask> {
        let mask = Arc::new(mask);
        *self.colmask.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&mask));
        mask
    }

    /// Forget the in-memory mask; the next access reads it from disk again.
    pub fn invalidate_colmask(&self) {
        *self.colmask.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Normalize a feature matrix measured on `plate`.
    ///
    /// Returns only the columns kept by the mask, in [`colnames`](Self::colnames) order.
    pub fn normalize(&self, plate: &PlateId, data: ArrayView2<'_, f64>) -> CacheResult<Array2<f64>> {
        let params = self.load_params(plate)?;
        let mask = self.colmask()?;
        Ok(self.strategy.apply(data, &params, &mask)?)
    }

    /// Names of the columns [`normalize`](Self::normalize) returns.
    pub fn colnames<F: FeatureSource + ?Sized>(&self, source: &F) -> CacheResult<Vec<String>> {
        let mask = self.colmask()?;
        Ok(output_columns(source.colnames(), &mask)?)
    }

    /// Plates with a persisted parameter artifact, sorted.
    pub fn cached_plates(&self) -> CacheResult<Vec<PlateId>> {
        let dir = self.params_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&dir)(e)),
        };

        let mut plates = Vec::new();
        for entry in entries {
            let path = entry.map_err(CacheError::io(&dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                plates.push(PlateId::from(stem));
            }
        }
        plates.sort();
        Ok(plates)
    }

    /// Whether any parameter or mask artifact exists yet.
    pub fn has_artifacts(&self) -> CacheResult<bool> {
        Ok(self.colmask_path().is_file() || !self.cached_plates()?.is_empty())
    }
}
