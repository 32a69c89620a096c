//! On-disk artifact formats.
//!
//! Every artifact is one JSON document carrying a format version and the
//! strategy that produced it. Floats round-trip exactly (`serde_json` is
//! built with `float_roundtrip`). Writes go to a temporary file in the target
//! directory and are renamed into place, so a reader never observes a
//! partially written artifact.

use crate::error::{CacheError, CacheResult};
use ndarray::Array2;
use platenorm_core::{ColumnMask, Normalization, Params, PlateId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 1;

/// File extension of every artifact.
pub const EXTENSION: &str = "json";

/// Serialized parameters of one plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsFile {
    pub version: u32,
    pub strategy: Normalization,
    pub plate: PlateId,
    /// `[statistic_count, feature_count]`; `[0, n]` for null parameters.
    pub shape: [usize; 2],
    /// Row-major values.
    pub values: Vec<f64>,
}

impl ParamsFile {
    pub fn new(strategy: Normalization, plate: &PlateId, params: &Params) -> Self {
        Self {
            version: FORMAT_VERSION,
            strategy,
            plate: plate.clone(),
            shape: [params.statistic_count(), params.feature_count()],
            values: params.as_array().iter().copied().collect(),
        }
    }

    /// Validate against the expected strategy and rebuild the parameter array.
    pub fn into_params(self, expected: Normalization, path: &Path) -> CacheResult<Params> {
        check_header(self.version, self.strategy, expected, path)?;
        let [rows, cols] = self.shape;
        let values = Array2::from_shape_vec((rows, cols), self.values)
            .map_err(|e| CacheError::corrupt(path, format!("shape {:?}: {}", self.shape, e)))?;
        Params::from_array(values).map_err(|e| CacheError::corrupt(path, e.to_string()))
    }
}

/// Serialized column mask of one strategy instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskFile {
    pub version: u32,
    pub strategy: Normalization,
    /// Plates whose parameters took part in the intersection.
    pub contributing_plates: usize,
    pub mask: ColumnMask,
}

impl MaskFile {
    pub fn new(strategy: Normalization, contributing_plates: usize, mask: &ColumnMask) -> Self {
        Self {
            version: FORMAT_VERSION,
            strategy,
            contributing_plates,
            mask: mask.clone(),
        }
    }

    pub fn into_mask(self, expected: Normalization, path: &Path) -> CacheResult<ColumnMask> {
        check_header(self.version, self.strategy, expected, path)?;
        Ok(self.mask)
    }
}

fn check_header(
    version: u32,
    found: Normalization,
    expected: Normalization,
    path: &Path,
) -> CacheResult<()> {
    if version != FORMAT_VERSION {
        return Err(CacheError::corrupt(
            path,
            format!("unsupported format version {} (expected {})", version, FORMAT_VERSION),
        ));
    }
    if found != expected {
        return Err(CacheError::StrategyMismatch {
            path: path.to_path_buf(),
            expected,
            found,
        });
    }
    Ok(())
}

/// Write `value` as JSON to `path`, replacing any existing file atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> CacheResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CacheError::corrupt(path, "artifact path has no parent directory"))?;
    std::fs::create_dir_all(dir).map_err(CacheError::io(dir))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(CacheError::io(dir))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush().map_err(CacheError::io(path))?;
    }
    tmp.persist(path)
        .map_err(|e| CacheError::io(path)(e.error))?;
    Ok(())
}

/// Read a JSON artifact. `Ok(None)` if the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> CacheResult<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::io(path)(e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CacheError::corrupt(path, e.to_string()))
}
