//! Shared types: plate and image identifiers, parameter arrays, column masks.

use crate::error::{NormError, NormResult};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of one physical plate. Primary key of the parameter cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlateId(pub String);

impl PlateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id as a file stem. Rejects ids that would escape or alias the
    /// parameter directory.
    pub fn file_stem(&self) -> NormResult<&str> {
        let id = self.0.as_str();
        let bad = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(&['/', '\\', '\0'][..]);
        if bad {
            return Err(NormError::InvalidPlateId(id.to_string()));
        }
        Ok(id)
    }
}

impl fmt::Display for PlateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlateId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlateId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Key of one control observation (e.g. table + image number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageKey(pub Vec<i64>);

impl ImageKey {
    pub fn new(parts: Vec<i64>) -> Self {
        Self(parts)
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        f.write_str(&parts.join("-"))
    }
}

/// Per-plate normalization parameters, shape `(statistic_count, feature_count)`.
///
/// A regular value has two rows (location-like row 0, scale- or upper-bound
/// row 1). The null value has zero rows and marks a plate without controls.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    values: Array2<f64>,
}

impl Params {
    /// Number of statistic rows in a non-null parameter array.
    pub const STATISTIC_COUNT: usize = 2;

    /// Wrap a raw array. Only 0-row (null) and 2-row arrays are valid.
    pub fn from_array(values: Array2<f64>) -> NormResult<Self> {
        let rows = values.nrows();
        if rows != 0 && rows != Self::STATISTIC_COUNT {
            return Err(NormError::invalid_input(format!(
                "parameter array must have 0 or {} rows, got {}",
                Self::STATISTIC_COUNT,
                rows
            )));
        }
        Ok(Self { values })
    }

    /// The null value: zero statistic rows, `feature_count` columns.
    pub fn null(feature_count: usize) -> Self {
        Self {
            values: Array2::zeros((0, feature_count)),
        }
    }

    pub fn is_null(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn feature_count(&self) -> usize {
        self.values.ncols()
    }

    pub fn statistic_count(&self) -> usize {
        self.values.nrows()
    }

    /// Row `i` of the parameter array.
    ///
    /// # Panics
    /// Panics if `i` is out of bounds (always the case for null params).
    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.values.row(i)
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_array(self) -> Array2<f64> {
        self.values
    }
}

/// One boolean per feature column; `true` keeps the column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMask(Vec<bool>);

impl ColumnMask {
    /// A mask that keeps every column.
    pub fn all(len: usize) -> Self {
        Self(vec![true; len])
    }

    /// The mask of usable columns given a per-column degeneracy vector.
    pub fn from_degenerate(degenerate: &[bool]) -> Self {
        Self(degenerate.iter().map(|d| !d).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of kept columns.
    pub fn kept(&self) -> usize {
        self.0.iter().filter(|k| **k).count()
    }

    pub fn get(&self, column: usize) -> Option<bool> {
        self.0.get(column).copied()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Indices of the kept columns, ascending.
    pub fn kept_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(j, keep)| keep.then_some(j))
            .collect()
    }

    /// Logical AND with another mask of the same length.
    pub fn intersect(&mut self, other: &ColumnMask) -> NormResult<()> {
        if other.len() != self.len() {
            return Err(NormError::ShapeMismatch {
                what: "mask intersection",
                expected: self.len(),
                actual: other.len(),
            });
        }
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a &= *b;
        }
        Ok(())
    }
}

impl From<Vec<bool>> for ColumnMask {
    fn from(mask: Vec<bool>) -> Self {
        Self(mask)
    }
}

/// Control image keys of one plate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateControls {
    pub plate: PlateId,
    pub image_keys: Vec<ImageKey>,
}

/// Ordered plate → control-image mapping returned by a resolver.
///
/// Iteration follows first-insertion order of the plates.
#[derive(Debug, Clone, Default)]
pub struct ControlMap {
    plates: Vec<PlateControls>,
    index: HashMap<PlateId, usize>,
}

impl ControlMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a control image to a plate, creating the plate entry if needed.
    pub fn push(&mut self, plate: PlateId, key: ImageKey) {
        self.entry(plate).image_keys.push(key);
    }

    /// Register a plate, keeping any keys already recorded for it.
    pub fn insert_plate(&mut self, plate: PlateId, keys: Vec<ImageKey>) {
        self.entry(plate).image_keys.extend(keys);
    }

    fn entry(&mut self, plate: PlateId) -> &mut PlateControls {
        let idx = match self.index.get(&plate) {
            Some(&idx) => idx,
            None => {
                let idx = self.plates.len();
                self.index.insert(plate.clone(), idx);
                self.plates.push(PlateControls {
                    plate,
                    image_keys: Vec::new(),
                });
                idx
            }
        };
        &mut self.plates[idx]
    }

    pub fn get(&self, plate: &PlateId) -> Option<&[ImageKey]> {
        self.index
            .get(plate)
            .map(|&idx| self.plates[idx].image_keys.as_slice())
    }

    pub fn len(&self) -> usize {
        self.plates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PlateControls> {
        self.plates.iter()
    }

    pub fn plates(&self) -> impl Iterator<Item = &PlateId> {
        self.plates.iter().map(|p| &p.plate)
    }

    pub fn entries(&self) -> &[PlateControls] {
        &self.plates
    }
}

impl<'a> IntoIterator for &'a ControlMap {
    type Item = &'a PlateControls;
    type IntoIter = std::slice::Iter<'a, PlateControls>;

    fn into_iter(self) -> Self::IntoIter {
        self.plates.iter()
    }
}

impl FromIterator<(PlateId, ImageKey)> for ControlMap {
    fn from_iter<I: IntoIterator<Item = (PlateId, ImageKey)>>(iter: I) -> Self {
        let mut map = ControlMap::new();
        for (plate, key) in iter {
            map.push(plate, key);
        }
        map
    }
}

impl PartialEq for ControlMap {
    fn eq(&self, other: &Self) -> bool {
        self.plates == other.plates
    }
}

/// Features loaded for a set of image keys.
#[derive(Debug, Clone)]
pub struct LoadedFeatures {
    /// Rows = observations, columns = features in source column order.
    pub features: Array2<f64>,
    /// Image key of each row.
    pub image_keys: Vec<ImageKey>,
}
