//! Batch parameter computation over every plate with controls.

use crate::cache::ParamCache;
use crate::error::CacheResult;
use platenorm_core::{
    ColumnMask, ControlResolver, FeatureSource, NormError, PlateControls, PlateId,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// How a precompute run treats existing artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecomputeOptions {
    /// Keep parameter artifacts that already exist.
    pub resume: bool,
    /// Compute plates concurrently. Needs the `parallel` feature; ignored otherwise.
    pub parallel: bool,
}

impl PrecomputeOptions {
    pub fn resume() -> Self {
        Self {
            resume: true,
            ..Self::default()
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// What happened to one plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateOutcome {
    /// Parameters computed from this many control observations.
    Computed { observations: usize },
    /// Artifact already present under resume.
    Skipped,
    /// No control rows were loaded; null parameters written.
    NoControls,
}

/// Observer of a precompute run.
///
/// With parallel computation `plate_done` is called from worker threads in no
/// particular order.
pub trait Progress: Sync {
    fn start(&self, _plates: usize) {}

    fn plate_done(&self, plate: &PlateId, outcome: PlateOutcome);

    fn finish(&self) {}
}

/// A [`Progress`] that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn plate_done(&self, _plate: &PlateId, _outcome: PlateOutcome) {}
}

/// Summary of a precompute run. Plate lists follow resolver order.
#[derive(Debug, Clone)]
pub struct PrecomputeReport {
    pub computed: Vec<PlateId>,
    pub skipped: Vec<PlateId>,
    pub no_controls: Vec<PlateId>,
    pub mask: Arc<ColumnMask>,
}

impl PrecomputeReport {
    pub fn plates(&self) -> usize {
        self.computed.len() + self.skipped.len() + self.no_controls.len()
    }
}

impl ParamCache {
    /// Compute and persist parameters for every plate the resolver returns for
    /// `predicate`, then derive the column mask.
    pub fn precompute<R, F>(
        &self,
        resolver: &R,
        source: &F,
        predicate: &str,
        options: &PrecomputeOptions,
    ) -> CacheResult<PrecomputeReport>
    where
        R: ControlResolver + ?Sized,
        F: FeatureSource + ?Sized,
    {
        self.precompute_with_progress(resolver, source, predicate, options, &NoProgress)
    }

    /// [`precompute`](Self::precompute) reporting each plate to `progress`.
    ///
    /// The mask is always re-derived from the full control set, also when
    /// every plate was skipped.
    #[instrument(skip_all, fields(strategy = %self.strategy(), resolver = resolver.name(), predicate = %predicate))]
    pub fn precompute_with_progress<R, F>(
        &self,
        resolver: &R,
        source: &F,
        predicate: &str,
        options: &PrecomputeOptions,
        progress: &dyn Progress,
    ) -> CacheResult<PrecomputeReport>
    where
        R: ControlResolver + ?Sized,
        F: FeatureSource + ?Sized,
    {
        let started = Instant::now();
        let controls = resolver.resolve(predicate)?;
        info!(
            plates = controls.len(),
            resume = options.resume,
            dir = %self.dir().display(),
            "computing normalization parameters"
        );

        progress.start(controls.len());
        let outcomes = if options.parallel {
            self.compute_parallel(controls.entries(), source, options.resume, progress)?
        } else {
            self.compute_sequential(controls.entries(), source, options.resume, progress)?
        };
        progress.finish();

        let mut computed = Vec::new();
        let mut skipped = Vec::new();
        let mut no_controls = Vec::new();
        for (plate, outcome) in outcomes {
            match outcome {
                PlateOutcome::Computed { .. } => computed.push(plate),
                PlateOutcome::Skipped => skipped.push(plate),
                PlateOutcome::NoControls => no_controls.push(plate),
            }
        }

        let mask = self.derive_colmask(&controls)?;
        info!(
            computed = computed.len(),
            skipped = skipped.len(),
            no_controls = no_controls.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "precompute finished"
        );

        Ok(PrecomputeReport {
            computed,
            skipped,
            no_controls,
            mask,
        })
    }

    fn compute_sequential<F: FeatureSource + ?Sized>(
        &self,
        plates: &[PlateControls],
        source: &F,
        resume: bool,
        progress: &dyn Progress,
    ) -> CacheResult<Vec<(PlateId, PlateOutcome)>> {
        plates
            .iter()
            .map(|entry| self.compute_plate(entry, source, resume, progress))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn compute_parallel<F: FeatureSource + ?Sized>(
        &self,
        plates: &[PlateControls],
        source: &F,
        resume: bool,
        progress: &dyn Progress,
    ) -> CacheResult<Vec<(PlateId, PlateOutcome)>> {
        use rayon::prelude::*;

        debug!(threads = rayon::current_num_threads(), "computing plates in parallel");
        plates
            .par_iter()
            .map(|entry| self.compute_plate(entry, source, resume, progress))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_parallel<F: FeatureSource + ?Sized>(
        &self,
        plates: &[PlateControls],
        source: &F,
        resume: bool,
        progress: &dyn Progress,
    ) -> CacheResult<Vec<(PlateId, PlateOutcome)>> {
        debug!("built without the parallel feature; computing plates sequentially");
        self.compute_sequential(plates, source, resume, progress)
    }

    fn compute_plate<F: FeatureSource + ?Sized>(
        &self,
        entry: &PlateControls,
        source: &F,
        resume: bool,
        progress: &dyn Progress,
    ) -> CacheResult<(PlateId, PlateOutcome)> {
        let plate = &entry.plate;
        let outcome = if resume && self.has_params(plate)? {
            debug!(plate = %plate, "parameters present, skipping");
            PlateOutcome::Skipped
        } else {
            let loaded = source.load(&entry.image_keys)?;
            let features = loaded.features;
            if features.ncols() != source.feature_count() {
                return Err(NormError::ShapeMismatch {
                    what: "loaded features vs source columns",
                    expected: source.feature_count(),
                    actual: features.ncols(),
                }
                .into());
            }

            if features.nrows() == 0 {
                warn!(plate = %plate, "no control features for plate; storing null parameters");
                self.save_params(plate, &self.strategy().null_params(source.feature_count()))?;
                PlateOutcome::NoControls
            } else {
                let params = self.strategy().compute_params(features.view())?;
                self.save_params(plate, &params)?;
                debug!(plate = %plate, observations = features.nrows(), "computed parameters");
                PlateOutcome::Computed {
                    observations: features.nrows(),
                }
            }
        };

        progress.plate_done(plate, outcome);
        Ok((plate.clone(), outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheConfig;
    use platenorm_core::{ImageRecord, InMemoryDataset, Normalization};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, PlateOutcome)>>, Mutex<Option<usize>>);

    impl Progress for Recorder {
        fn start(&self, plates: usize) {
            *self.1.lock().unwrap() = Some(plates);
        }

        fn plate_done(&self, plate: &PlateId, outcome: PlateOutcome) {
            self.0.lock().unwrap().push((plate.to_string(), outcome));
        }
    }

    fn dataset() -> InMemoryDataset {
        let mut d = InMemoryDataset::new(vec!["a".into(), "b".into()]);
        for (i, (plate, a, b)) in [("P1", 1.0, 5.0), ("P1", 3.0, 9.0), ("P2", 2.0, 4.0), ("P2", 6.0, 8.0)]
            .into_iter()
            .enumerate()
        {
            d.push(ImageRecord::new(plate, vec![i as i64], vec![a, b]).with_attribute("role", "control"))
                .unwrap();
        }
        d.push(ImageRecord::new("P3", vec![10], vec![]).with_attribute("role", "control"))
            .unwrap();
        d
    }

    #[test]
    fn reports_each_plate_outcome() {
        let dir = TempDir::new().unwrap();
        let cache = ParamCache::new(&CacheConfig::new(dir.path(), Normalization::RobustZ));
        let data = dataset();
        let recorder = Recorder::default();

        let report = cache
            .precompute_with_progress(&data, &data, "role=control", &PrecomputeOptions::default(), &recorder)
            .unwrap();

        assert_eq!(*recorder.1.lock().unwrap(), Some(3));
        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                ("P1".to_string(), PlateOutcome::Computed { observations: 2 }),
                ("P2".to_string(), PlateOutcome::Computed { observations: 2 }),
                ("P3".to_string(), PlateOutcome::NoControls),
            ]
        );
        assert_eq!(report.plates(), 3);
        assert_eq!(report.no_controls, vec![PlateId::from("P3")]);
        assert_eq!(report.mask.as_slice(), &[true, true]);
        assert!(cache.load_params(&"P3".into()).unwrap().is_null());
    }

    #[test]
    fn resume_reports_skips() {
        let dir = TempDir::new().unwrap();
        let cache = ParamCache::new(&CacheConfig::new(dir.path(), Normalization::RobustLinear));
        let data = dataset();
        cache
            .precompute(&data, &data, "role=control", &PrecomputeOptions::default())
            .unwrap();

        let report = cache
            .precompute(&data, &data, "role=control", &PrecomputeOptions::resume())
            .unwrap();
        assert!(report.computed.is_empty());
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(report.mask.len(), 2);
    }

    #[test]
    fn invalid_predicate_propagates() {
        let dir = TempDir::new().unwrap();
        let cache = ParamCache::new(&CacheConfig::new(dir.path(), Normalization::RobustZ));
        let data = dataset();
        let err = cache
            .precompute(&data, &data, "role", &PrecomputeOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::CacheError::Norm(NormError::InvalidPredicate { .. })
        ));
    }
}
