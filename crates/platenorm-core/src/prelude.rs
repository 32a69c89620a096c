//! Convenient imports for common usage.
//!
//! ```rust
//! use platenorm_core::prelude::*;
//! ```

pub use crate::error::{NormError, NormResult};
pub use crate::source::{ControlResolver, FeatureSource};
pub use crate::strategy::{output_columns, Normalization};
pub use crate::types::{ColumnMask, ControlMap, ImageKey, LoadedFeatures, Params, PlateId};
