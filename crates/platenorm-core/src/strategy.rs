//! Normalization strategies.
//!
//! A strategy turns the control observations of one plate into a small
//! parameter array, decides which columns cannot be normalized with those
//! parameters, and applies them to new data from the same plate.
//!
//! | Strategy | Row 0 | Row 1 | Transform |
//! |----------|-------|-------|-----------|
//! | `RobustZ` | median | MAD / Φ⁻¹(0.75) | `(x - row0) / row1` |
//! | `RobustLinear` | 1st percentile | 99th percentile | `(x - row0) / (row1 - row0)` |

use crate::error::{NormError, NormResult};
use crate::stats;
use crate::types::{ColumnMask, Params};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const LOWER_PERCENTILE: f64 = 1.0;
const UPPER_PERCENTILE: f64 = 99.0;

/// The closed set of per-plate normalization strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Median / scaled-MAD standardization.
    #[default]
    RobustZ,
    /// 1st-99th percentile range scaling.
    RobustLinear,
}

impl Normalization {
    pub const ALL: [Normalization; 2] = [Normalization::RobustZ, Normalization::RobustLinear];

    pub fn name(&self) -> &'static str {
        match self {
            Normalization::RobustZ => "robust_z",
            Normalization::RobustLinear => "robust_linear",
        }
    }

    /// Subdirectory of the cache root used when no explicit one is configured.
    pub fn default_param_dir(&self) -> &'static str {
        match self {
            Normalization::RobustZ => "robust_std",
            Normalization::RobustLinear => "robust_linear",
        }
    }

    /// Compute parameters from the control features of one plate.
    ///
    /// Requires at least one row, at least one column, and finite values.
    pub fn compute_params(&self, features: ArrayView2<'_, f64>) -> NormResult<Params> {
        let (rows, cols) = features.dim();
        if rows == 0 {
            return Err(NormError::invalid_input("feature matrix has no rows"));
        }
        if cols == 0 {
            return Err(NormError::invalid_input("feature matrix has no columns"));
        }
        if let Some(((row, column), _)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(NormError::NonFinite { row, column });
        }

        let mut params = Array2::from_elem((Params::STATISTIC_COUNT, cols), f64::NAN);
        match self {
            Normalization::RobustZ => {
                let c = stats::mad_consistency_constant()?;
                for (j, column) in features.axis_iter(Axis(1)).enumerate() {
                    let values = column.to_vec();
                    let center = stats::median(&values);
                    params[[0, j]] = center;
                    params[[1, j]] = stats::scaled_mad(&values, center, c);
                }
            }
            Normalization::RobustLinear => {
                for (j, column) in features.axis_iter(Axis(1)).enumerate() {
                    let mut sorted = column.to_vec();
                    sorted.sort_by(|a, b| a.total_cmp(b));
                    params[[0, j]] = stats::percentile_sorted(&sorted, LOWER_PERCENTILE);
                    params[[1, j]] = stats::percentile_sorted(&sorted, UPPER_PERCENTILE);
                }
            }
        }
        Params::from_array(params)
    }

    /// Parameters standing in for a plate without control observations.
    pub fn null_params(&self, feature_count: usize) -> Params {
        Params::null(feature_count)
    }

    /// Per column: `true` where normalization with `params` is undefined.
    ///
    /// Null params are degenerate everywhere.
    pub fn is_degenerate(&self, params: &Params) -> Vec<bool> {
        if params.is_null() {
            return vec![true; params.feature_count()];
        }
        // NaN divisors count as degenerate
        self.divisor(params).iter().map(|d| !(*d > 0.0)).collect()
    }

    /// Normalize `data` with `params`, keeping only columns where `mask` is true.
    ///
    /// # Panics
    /// Panics if a retained column has a non-positive divisor. That means
    /// `mask` was derived from a different parameter set than `params`.
    pub fn apply(
        &self,
        data: ArrayView2<'_, f64>,
        params: &Params,
        mask: &ColumnMask,
    ) -> NormResult<Array2<f64>> {
        if data.ncols() != params.feature_count() {
            return Err(NormError::ShapeMismatch {
                what: "data vs params",
                expected: params.feature_count(),
                actual: data.ncols(),
            });
        }
        if mask.len() != params.feature_count() {
            return Err(NormError::ShapeMismatch {
                what: "mask vs params",
                expected: params.feature_count(),
                actual: mask.len(),
            });
        }
        if params.is_null() {
            return Err(NormError::invalid_input(
                "plate has null parameters (no control observations)",
            ));
        }

        let kept = mask.kept_indices();
        let data = data.select(Axis(1), &kept);
        let shift = params.row(0).select(Axis(0), &kept);
        let divisor = self.divisor(params).select(Axis(0), &kept);
        assert!(
            divisor.iter().all(|d| *d > 0.0),
            "{} divisor is not positive on a masked-in column; column mask is stale for these parameters",
            self
        );

        Ok((&data - &shift) / &divisor)
    }

    fn divisor(&self, params: &Params) -> Array1<f64> {
        match self {
            Normalization::RobustZ => params.row(1).to_owned(),
            Normalization::RobustLinear => &params.row(1) - &params.row(0),
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Normalization {
    type Err = NormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "robust_z" | "robust-z" | "robust_std" => Ok(Normalization::RobustZ),
            "robust_linear" | "robust-linear" => Ok(Normalization::RobustLinear),
            other => Err(NormError::invalid_input(format!(
                "unknown normalization {:?} (expected robust_z or robust_linear)",
                other
            ))),
        }
    }
}

/// Names of the columns `apply` returns for `mask`, in order.
pub fn output_columns<S: AsRef<str>>(all_columns: &[S], mask: &ColumnMask) -> NormResult<Vec<String>> {
    if all_columns.len() != mask.len() {
        return Err(NormError::ShapeMismatch {
            what: "column names vs mask",
            expected: mask.len(),
            actual: all_columns.len(),
        });
    }
    Ok(all_columns
        .iter()
        .zip(mask.as_slice())
        .filter(|(_, keep)| **keep)
        .map(|(name, _)| name.as_ref().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn sample_features() -> Array2<f64> {
        // 7 observations, 3 features with different location/spread
        array![
            [1.0, 10.0, -3.0],
            [2.0, 14.0, -1.0],
            [3.0, 11.0, 0.0],
            [4.0, 19.0, 2.0],
            [5.0, 12.0, 5.0],
            [6.0, 30.0, 8.0],
            [100.0, 13.0, 9.0],
        ]
    }

    #[test]
    fn params_have_two_rows_per_column() {
        for strategy in Normalization::ALL {
            let params = strategy.compute_params(sample_features().view()).unwrap();
            assert_eq!(params.statistic_count(), 2);
            assert_eq!(params.feature_count(), 3);
        }
    }

    #[test]
    fn robust_z_values() {
        let params = Normalization::RobustZ
            .compute_params(array![[1.0], [2.0], [3.0], [4.0], [100.0]].view())
            .unwrap();
        assert_eq!(params.row(0)[0], 3.0);
        // raw MAD is 1; scaled by 1 / 0.6745
        assert!((params.row(1)[0] - 1.482_602_218_505_602).abs() < 1e-9);
    }

    #[test]
    fn robust_linear_values() {
        let column: Vec<f64> = (0..=100).map(f64::from).collect();
        let features = Array2::from_shape_vec((101, 1), column).unwrap();
        let params = Normalization::RobustLinear.compute_params(features.view()).unwrap();
        assert_eq!(params.row(0)[0], 1.0);
        assert_eq!(params.row(1)[0], 99.0);
    }

    #[test]
    fn rejects_empty_and_non_finite_input() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(matches!(
            Normalization::RobustZ.compute_params(empty.view()),
            Err(NormError::InvalidInput(_))
        ));

        let no_cols = Array2::<f64>::zeros((4, 0));
        assert!(Normalization::RobustLinear.compute_params(no_cols.view()).is_err());

        let nan = array![[1.0, 2.0], [f64::NAN, 3.0]];
        assert!(matches!(
            Normalization::RobustZ.compute_params(nan.view()),
            Err(NormError::NonFinite { row: 1, column: 0 })
        ));
    }

    #[test]
    fn constant_column_is_degenerate() {
        let features = array![[1.0, 5.0], [2.0, 5.0], [4.0, 5.0]];
        for strategy in Normalization::ALL {
            let params = strategy.compute_params(features.view()).unwrap();
            assert_eq!(strategy.is_degenerate(&params), vec![false, true]);
        }
    }

    #[test]
    fn linear_degeneracy_uses_the_range() {
        // constant non-zero column: upper percentile is 7 but the range is 0
        let features = array![[7.0], [7.0], [7.0]];
        let params = Normalization::RobustLinear.compute_params(features.view()).unwrap();
        assert_eq!(params.row(1)[0], 7.0);
        assert_eq!(Normalization::RobustLinear.is_degenerate(&params), vec![true]);
    }

    #[test]
    fn null_params_are_fully_degenerate() {
        let null = Normalization::RobustZ.null_params(4);
        assert!(null.is_null());
        assert_eq!(Normalization::RobustZ.is_degenerate(&null), vec![true; 4]);
    }

    #[test]
    fn robust_z_round_trip() {
        let features = sample_features();
        let params = Normalization::RobustZ.compute_params(features.view()).unwrap();
        let out = Normalization::RobustZ
            .apply(features.view(), &params, &ColumnMask::all(3))
            .unwrap();
        let again = Normalization::RobustZ.compute_params(out.view()).unwrap();
        for j in 0..3 {
            assert!(again.row(0)[j].abs() < 1e-9, "median of column {}", j);
            assert!((again.row(1)[j] - 1.0).abs() < 1e-9, "scale of column {}", j);
        }
    }

    #[test]
    fn robust_linear_round_trip() {
        let features = sample_features();
        let params = Normalization::RobustLinear.compute_params(features.view()).unwrap();
        let out = Normalization::RobustLinear
            .apply(features.view(), &params, &ColumnMask::all(3))
            .unwrap();
        let again = Normalization::RobustLinear.compute_params(out.view()).unwrap();
        for j in 0..3 {
            assert!(again.row(0)[j].abs() < 1e-9);
            assert!((again.row(1)[j] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn apply_respects_mask_and_column_names() {
        let features = sample_features();
        let params = Normalization::RobustZ.compute_params(features.view()).unwrap();
        let mask = ColumnMask::from(vec![true, false, true]);
        let out = Normalization::RobustZ
            .apply(features.view(), &params, &mask)
            .unwrap();

        let names = output_columns(&["area", "intensity", "texture"], &mask).unwrap();
        assert_eq!(names, vec!["area", "texture"]);
        assert_eq!(names.len(), mask.kept());
        assert_eq!(out.ncols(), names.len());
        assert_eq!(out.nrows(), features.nrows());
    }

    #[test]
    fn apply_rejects_shape_mismatch() {
        let params = Normalization::RobustZ
            .compute_params(sample_features().view())
            .unwrap();
        let narrow = array![[1.0, 2.0]];
        assert!(matches!(
            Normalization::RobustZ.apply(narrow.view(), &params, &ColumnMask::all(3)),
            Err(NormError::ShapeMismatch { .. })
        ));
        assert!(output_columns(&["a", "b"], &ColumnMask::all(3)).is_err());
    }

    #[test]
    #[should_panic(expected = "column mask is stale")]
    fn apply_panics_on_stale_mask() {
        let features = array![[1.0, 5.0], [2.0, 5.0], [4.0, 5.0]];
        let params = Normalization::RobustZ.compute_params(features.view()).unwrap();
        let _ = Normalization::RobustZ.apply(features.view(), &params, &ColumnMask::all(2));
    }

    #[test]
    fn parses_names() {
        assert_eq!("robust_z".parse::<Normalization>().unwrap(), Normalization::RobustZ);
        assert_eq!(
            "Robust-Linear".parse::<Normalization>().unwrap(),
            Normalization::RobustLinear
        );
        assert!("zscore".parse::<Normalization>().is_err());
        assert_eq!(serde_json::to_string(&Normalization::RobustLinear).unwrap(), "\"robust_linear\"");
    }
}
