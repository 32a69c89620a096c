//! Dataset file loading.

use anyhow::{bail, Context, Result};
use platenorm_core::InMemoryDataset;
use std::path::Path;

/// Load a screen from a JSON dataset file.
pub fn load(path: &Path) -> Result<InMemoryDataset> {
    if !path.exists() {
        bail!("Dataset does not exist: {}", path.display());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;
    let dataset: InMemoryDataset = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dataset: {}", path.display()))?;
    tracing::debug!(path = %path.display(), images = dataset.len(), "loaded dataset");
    Ok(dataset)
}
