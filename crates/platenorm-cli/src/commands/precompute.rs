//! Compute per-plate parameters and the column mask.

use anyhow::{bail, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use platenorm_cache::{ParamCache, PlateOutcome, PrecomputeOptions, PrecomputeReport, Progress};
use platenorm_core::PlateId;

use crate::config::Config;
use crate::dataset;

/// How to treat a cache directory that already holds parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Refuse to touch existing parameters.
    Fresh,
    /// Keep existing parameters, compute the missing ones.
    Resume,
    /// Recompute everything.
    Force,
}

impl Mode {
    pub fn from_flags(resume: bool, force: bool) -> Self {
        match (resume, force) {
            (true, _) => Mode::Resume,
            (false, true) => Mode::Force,
            (false, false) => Mode::Fresh,
        }
    }
}

struct BarProgress {
    bar: ProgressBar,
    verbose: bool,
}

impl BarProgress {
    fn new(verbose: bool) -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} plates {msg}")?
                .progress_chars("#>-"),
        );
        Ok(Self { bar, verbose })
    }
}

impl Progress for BarProgress {
    fn start(&self, plates: usize) {
        self.bar.set_length(plates as u64);
    }

    fn plate_done(&self, plate: &PlateId, outcome: PlateOutcome) {
        if self.verbose {
            let status = match outcome {
                PlateOutcome::Computed { observations } => format!("{} ({} controls)", plate, observations),
                PlateOutcome::Skipped => format!("{} (cached)", plate),
                PlateOutcome::NoControls => format!("{} (no controls)", plate),
            };
            self.bar.set_message(status);
        }
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

pub fn run(config: &Config, predicate: Option<&str>, mode: Mode, parallel: bool) -> Result<()> {
    let report = execute(config, predicate, mode, parallel, true)?;
    print_summary(&report);
    Ok(())
}

pub(crate) fn execute(
    config: &Config,
    predicate: Option<&str>,
    mode: Mode,
    parallel: bool,
    show_progress: bool,
) -> Result<PrecomputeReport> {
    let cache = ParamCache::new(&config.cache_config());
    if mode == Mode::Fresh && cache.has_artifacts()? {
        bail!(
            "{} already holds parameters; pass --resume to continue or --force to recompute",
            cache.dir().display()
        );
    }

    let dataset = dataset::load(&config.dataset_path())?;
    let predicate = predicate.unwrap_or(&config.precompute.predicate);
    let options = PrecomputeOptions {
        resume: mode == Mode::Resume,
        parallel: parallel || config.precompute.parallel,
    };

    println!(
        "{} Computing {} parameters for controls matching {}...",
        "→".blue(),
        cache.strategy().to_string().cyan(),
        predicate.cyan()
    );

    let report = if show_progress {
        let progress = BarProgress::new(tracing::enabled!(tracing::Level::DEBUG))?;
        cache.precompute_with_progress(&dataset, &dataset, predicate, &options, &progress)?
    } else {
        cache.precompute(&dataset, &dataset, predicate, &options)?
    };
    Ok(report)
}

fn print_summary(report: &PrecomputeReport) {
    let mask = &report.mask;
    println!();
    println!("{} Precompute complete!", "✓".green().bold());
    println!("  Computed: {}", report.computed.len().to_string().cyan());
    println!("  Cached:   {}", report.skipped.len().to_string().cyan());
    if report.no_controls.is_empty() {
        println!("  No controls: {}", "0".cyan());
    } else {
        println!(
            "  No controls: {} ({})",
            report.no_controls.len().to_string().yellow(),
            report
                .no_controls
                .iter()
                .map(PlateId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    println!(
        "  Columns kept: {}/{}",
        mask.kept().to_string().cyan(),
        mask.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DATASET: &str = r#"{
        "colnames": ["area", "intensity"],
        "images": [
            {"plate": "P1", "key": [1, 1], "attributes": {"compound": "DMSO"}, "features": [10.0, 1.0]},
            {"plate": "P1", "key": [1, 2], "attributes": {"compound": "DMSO"}, "features": [12.0, 3.0]},
            {"plate": "P1", "key": [1, 3], "attributes": {"compound": "taxol"}, "features": [30.0, 9.0]},
            {"plate": "P2", "key": [2, 1], "attributes": {"compound": "DMSO"}, "features": [11.0, 2.0]},
            {"plate": "P2", "key": [2, 2], "attributes": {"compound": "DMSO"}, "features": [15.0, 2.0]}
        ]
    }"#;

    fn project() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dataset.json"), DATASET).unwrap();
        let path = dir.path().join(crate::config::CONFIG_FILE);
        Config::default().save(&path).unwrap();
        let config = Config::from_file(&path).unwrap();
        (dir, config)
    }

    #[test]
    fn mode_from_flags() {
        assert_eq!(Mode::from_flags(false, false), Mode::Fresh);
        assert_eq!(Mode::from_flags(true, false), Mode::Resume);
        assert_eq!(Mode::from_flags(false, true), Mode::Force);
    }

    #[test]
    fn refuses_existing_cache_without_resume_or_force() {
        let (_dir, config) = project();
        let report = execute(&config, None, Mode::Fresh, false, false).unwrap();
        assert_eq!(report.computed.len(), 2);
        // intensity is constant on P2
        assert_eq!(report.mask.as_slice(), &[true, false]);

        let err = execute(&config, None, Mode::Fresh, false, false).unwrap_err();
        assert!(err.to_string().contains("--resume"));

        let resumed = execute(&config, None, Mode::Resume, false, false).unwrap();
        assert_eq!(resumed.skipped.len(), 2);

        let forced = execute(&config, None, Mode::Force, false, false).unwrap();
        assert_eq!(forced.computed.len(), 2);
    }

    #[test]
    fn missing_dataset_is_reported() {
        let (dir, config) = project();
        std::fs::remove_file(dir.path().join("dataset.json")).unwrap();
        let err = execute(&config, None, Mode::Fresh, false, false).unwrap_err();
        assert!(err.to_string().contains("Dataset does not exist"));
    }
}
