//! Normalize the images of one plate.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use platenorm_cache::ParamCache;
use platenorm_core::{FeatureSource, ImageKey, InMemoryDataset, PlateId};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::config::Config;
use crate::dataset;

#[derive(Debug, Serialize)]
pub struct NormalizedPlate {
    pub plate: PlateId,
    pub strategy: String,
    pub colnames: Vec<String>,
    pub rows: Vec<NormalizedRow>,
}

#[derive(Debug, Serialize)]
pub struct NormalizedRow {
    pub key: ImageKey,
    pub values: Vec<f64>,
}

pub fn run(config: &Config, plate: &str, predicate: &str, output: Option<&Path>) -> Result<()> {
    let dataset = dataset::load(&config.dataset_path())?;
    let normalized = normalize_plate(config, &dataset, &PlateId::from(plate), predicate)?;

    let json = serde_json::to_string_pretty(&normalized)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write: {}", path.display()))?;
            println!(
                "{} Normalized {} images x {} columns of plate {} to {}",
                "✓".green().bold(),
                normalized.rows.len().to_string().cyan(),
                normalized.colnames.len().to_string().cyan(),
                plate.cyan(),
                path.display()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}

pub(crate) fn normalize_plate(
    config: &Config,
    dataset: &InMemoryDataset,
    plate: &PlateId,
    predicate: &str,
) -> Result<NormalizedPlate> {
    let keys: Vec<ImageKey> = dataset
        .select(predicate)?
        .into_iter()
        .filter(|record| record.plate == *plate)
        .map(|record| record.key.clone())
        .collect();
    if keys.is_empty() {
        bail!("No images of plate {} match {:?}", plate, predicate);
    }

    let loaded = dataset.load(&keys)?;
    let cache = ParamCache::new(&config.cache_config());
    let values = cache
        .normalize(plate, loaded.features.view())
        .with_context(|| format!("Failed to normalize plate {}", plate))?;

    let rows = loaded
        .image_keys
        .into_iter()
        .zip(values.rows())
        .map(|(key, row)| NormalizedRow {
            key,
            values: row.to_vec(),
        })
        .collect();

    Ok(NormalizedPlate {
        plate: plate.clone(),
        strategy: cache.strategy().to_string(),
        colnames: cache.colnames(dataset)?,
        rows,
    })
}
