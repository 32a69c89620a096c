//! In-memory dataset backing both [`ControlResolver`] and [`FeatureSource`].
//!
//! Holds one record per image: its plate, key, free-form attributes
//! (e.g. `compound = "DMSO"`), and one feature row. Useful for tests and for
//! small screens loaded from a JSON file.
//!
//! # Predicates
//!
//! Comma-separated clauses, all of which must hold:
//!
//! - `field=value`: attribute equals value
//! - `field!=value`: attribute missing or different
//!
//! `plate` refers to the record's plate. An empty predicate or `*` selects
//! every image.
//!
//! ```rust
//! use platenorm_core::memory::{ImageRecord, InMemoryDataset};
//! use platenorm_core::source::ControlResolver;
//!
//! let mut dataset = InMemoryDataset::new(vec!["area".into(), "intensity".into()]);
//! dataset.push(ImageRecord::new("P1", vec![1], vec![10.0, 0.5]).with_attribute("compound", "DMSO"))?;
//! dataset.push(ImageRecord::new("P1", vec![2], vec![12.0, 0.7]).with_attribute("compound", "taxol"))?;
//!
//! let controls = dataset.resolve("compound=DMSO")?;
//! assert_eq!(controls.len(), 1);
//! # Ok::<(), platenorm_core::NormError>(())
//! ```

use crate::error::{NormError, NormResult};
use crate::source::{ControlResolver, FeatureSource};
use crate::types::{ControlMap, ImageKey, LoadedFeatures, PlateId};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// One image of the screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub plate: PlateId,
    pub key: ImageKey,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// One value per dataset column, or empty if the image produced no
    /// usable measurement.
    #[serde(default)]
    pub features: Vec<f64>,
}

impl ImageRecord {
    pub fn new(plate: impl Into<PlateId>, key: Vec<i64>, features: Vec<f64>) -> Self {
        Self {
            plate: plate.into(),
            key: ImageKey::new(key),
            attributes: BTreeMap::new(),
            features,
        }
    }

    pub fn with_attribute(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    fn field(&self, name: &str) -> Option<&str> {
        if name == "plate" {
            Some(self.plate.as_str())
        } else {
            self.attributes.get(name).map(String::as_str)
        }
    }
}

/// Serialized form of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFile {
    pub colnames: Vec<String>,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
}

/// Screen held entirely in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DatasetFile", into = "DatasetFile")]
pub struct InMemoryDataset {
    colnames: Vec<String>,
    images: Vec<ImageRecord>,
    index: HashMap<ImageKey, usize>,
}

impl InMemoryDataset {
    pub fn new(colnames: Vec<String>) -> Self {
        Self {
            colnames,
            images: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add an image. Fails on a duplicate key or a feature row of the wrong width.
    pub fn push(&mut self, record: ImageRecord) -> NormResult<()> {
        if !record.features.is_empty() && record.features.len() != self.colnames.len() {
            return Err(NormError::ShapeMismatch {
                what: "image features vs dataset columns",
                expected: self.colnames.len(),
                actual: record.features.len(),
            });
        }
        if self.index.contains_key(&record.key) {
            return Err(NormError::invalid_input(format!(
                "duplicate image key {}",
                record.key
            )));
        }
        self.index.insert(record.key.clone(), self.images.len());
        self.images.push(record);
        Ok(())
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Images matching `predicate`, in dataset order.
    pub fn select(&self, predicate: &str) -> NormResult<Vec<&ImageRecord>> {
        let clauses = parse_predicate(predicate)?;
        Ok(self
            .images
            .iter()
            .filter(|record| clauses.iter().all(|c| c.matches(record)))
            .collect())
    }
}

impl TryFrom<DatasetFile> for InMemoryDataset {
    type Error = NormError;

    fn try_from(file: DatasetFile) -> Result<Self, Self::Error> {
        let mut dataset = InMemoryDataset::new(file.colnames);
        for record in file.images {
            dataset.push(record)?;
        }
        Ok(dataset)
    }
}

impl From<InMemoryDataset> for DatasetFile {
    fn from(dataset: InMemoryDataset) -> Self {
        DatasetFile {
            colnames: dataset.colnames,
            images: dataset.images,
        }
    }
}

impl ControlResolver for InMemoryDataset {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn resolve(&self, predicate: &str) -> NormResult<ControlMap> {
        let map: ControlMap = self
            .select(predicate)?
            .into_iter()
            .map(|record| (record.plate.clone(), record.key.clone()))
            .collect();
        debug!(predicate, plates = map.len(), "resolved control images");
        Ok(map)
    }
}

impl FeatureSource for InMemoryDataset {
    fn colnames(&self) -> &[String] {
        &self.colnames
    }

    /// Unknown keys and images without measurements contribute no row.
    fn load(&self, keys: &[ImageKey]) -> NormResult<LoadedFeatures> {
        let width = self.colnames.len();
        let mut values = Vec::with_capacity(keys.len() * width);
        let mut image_keys = Vec::with_capacity(keys.len());

        for key in keys {
            match self.index.get(key).map(|&i| &self.images[i]) {
                Some(record) if !record.features.is_empty() => {
                    values.extend_from_slice(&record.features);
                    image_keys.push(key.clone());
                }
                Some(_) => debug!(image = %key, "image has no measurements"),
                None => debug!(image = %key, "image not in dataset"),
            }
        }

        let features = Array2::from_shape_vec((image_keys.len(), width), values)
            .map_err(|e| NormError::invalid_input(e.to_string()))?;
        Ok(LoadedFeatures {
            features,
            image_keys,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Eq(String, String),
    Ne(String, String),
}

impl Clause {
    fn matches(&self, record: &ImageRecord) -> bool {
        match self {
            Clause::Eq(field, value) => record.field(field) == Some(value.as_str()),
            Clause::Ne(field, value) => record.field(field) != Some(value.as_str()),
        }
    }
}

fn parse_predicate(predicate: &str) -> NormResult<Vec<Clause>> {
    let trimmed = predicate.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return Ok(Vec::new());
    }

    let invalid = |reason: &str| NormError::InvalidPredicate {
        predicate: predicate.to_string(),
        reason: reason.to_string(),
    };

    trimmed
        .split(',')
        .map(|clause| {
            let clause = clause.trim();
            let (field, value, negated) = if let Some((f, v)) = clause.split_once("!=") {
                (f, v, true)
            } else if let Some((f, v)) = clause.split_once('=') {
                (f, v, false)
            } else {
                return Err(invalid("expected field=value or field!=value"));
            };
            let field = field.trim();
            if field.is_empty() {
                return Err(invalid("empty field name"));
            }
            let value = value.trim().trim_matches('"').to_string();
            Ok(if negated {
                Clause::Ne(field.to_string(), value)
            } else {
                Clause::Eq(field.to_string(), value)
            })
        })
        .collect()
}
