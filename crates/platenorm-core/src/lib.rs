//! # platenorm core
//!
//! Types and statistics for per-plate normalization of high-throughput
//! screening features.
//!
//! Plate-to-plate technical variation is removed with parameters estimated
//! only from the control wells of each plate:
//!
//! - **Normalization**: the closed set of strategies (`RobustZ`, `RobustLinear`)
//!   that compute, check and apply per-plate parameters
//! - **Params / ColumnMask**: parameter arrays and the cross-plate column filter
//! - **ControlResolver / FeatureSource**: seams to the control-well database
//!   and the feature store
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::array;
//! use platenorm_core::prelude::*;
//!
//! let controls = array![[1.0, 10.0], [2.0, 12.0], [4.0, 11.0]];
//! let params = Normalization::RobustZ.compute_params(controls.view())?;
//! let mask = ColumnMask::from_degenerate(&Normalization::RobustZ.is_degenerate(&params));
//!
//! let normalized = Normalization::RobustZ.apply(controls.view(), &params, &mask)?;
//! assert_eq!(normalized.ncols(), mask.kept());
//! # Ok::<(), NormError>(())
//! ```

pub mod error;
pub mod memory;
pub mod prelude;
pub mod source;
pub mod stats;
pub mod strategy;
pub mod types;

pub use error::{NormError, NormResult, SourceError};
pub use memory::{DatasetFile, ImageRecord, InMemoryDataset};
pub use source::{ControlResolver, FeatureSource};
pub use strategy::{output_columns, Normalization};
pub use types::{ColumnMask, ControlMap, ImageKey, LoadedFeatures, Params, PlateControls, PlateId};
