//! Show the state of the parameter cache.

use anyhow::Result;
use colored::Colorize;
use platenorm_cache::{CacheError, ParamCache};
use platenorm_core::FeatureSource;

use crate::config::Config;
use crate::dataset;

pub fn run(config: &Config) -> Result<()> {
    let cache = ParamCache::new(&config.cache_config());

    println!("{} Parameter cache", "→".blue());
    println!("  Strategy:  {}", cache.strategy().to_string().cyan());
    println!("  Directory: {}", cache.dir().display());
    println!("  Plates:    {}", cache.cached_plates()?.len().to_string().cyan());

    let mask = match cache.colmask() {
        Ok(mask) => mask,
        Err(CacheError::MaskNotFound(_)) => {
            println!();
            println!("  {} No column mask yet; run platenorm precompute", "•".yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let dropped = mask.len() - mask.kept();
    println!(
        "  Columns:   {} kept, {} dropped",
        mask.kept().to_string().green(),
        dropped.to_string().yellow()
    );

    if dropped == 0 {
        return Ok(());
    }
    match dataset::load(&config.dataset_path()) {
        Ok(dataset) if dataset.feature_count() == mask.len() => {
            println!();
            println!("{} Dropped columns", "→".blue());
            for (name, _) in dataset
                .colnames()
                .iter()
                .zip(mask.as_slice())
                .filter(|(_, keep)| !**keep)
            {
                println!("  {} {}", "✗".red(), name);
            }
        }
        Ok(dataset) => tracing::warn!(
            dataset_columns = dataset.feature_count(),
            mask_columns = mask.len(),
            "dataset does not match the column mask"
        ),
        Err(e) => tracing::debug!("dataset unavailable: {:#}", e),
    }
    Ok(())
}
