//! # platenorm cache
//!
//! On-disk cache of per-plate normalization parameters.
//!
//! A [`ParamCache`] owns one directory per normalization strategy. A
//! [`precompute`](ParamCache::precompute) run resolves the control images of
//! every plate, stores one parameter artifact per plate, and derives the
//! cross-plate column mask. Afterwards [`normalize`](ParamCache::normalize)
//! turns raw features of any plate into normalized ones.
//!
//! ## Quick Start
//!
//! ```rust
//! use ndarray::array;
//! use platenorm_cache::{CacheConfig, ParamCache, PrecomputeOptions};
//! use platenorm_core::{ImageRecord, InMemoryDataset, Normalization, PlateId};
//!
//! let mut screen = InMemoryDataset::new(vec!["area".into(), "intensity".into()]);
//! for (key, area, intensity) in [(1, 10.0, 0.2), (2, 14.0, 0.4), (3, 12.0, 0.9)] {
//!     screen.push(ImageRecord::new("P1", vec![key], vec![area, intensity]).with_attribute("compound", "DMSO"))?;
//! }
//!
//! let dir = tempfile::tempdir()?;
//! let cache = ParamCache::new(&CacheConfig::new(dir.path(), Normalization::RobustZ));
//! let report = cache.precompute(&screen, &screen, "compound=DMSO", &PrecomputeOptions::default())?;
//! assert_eq!(report.computed.len(), 1);
//!
//! let normalized = cache.normalize(&PlateId::from("P1"), array![[12.0, 0.4]].view())?;
//! assert_eq!(normalized.ncols(), cache.colnames(&screen)?.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `parallel` | Compute plates concurrently with rayon when requested |

pub mod artifact;
pub mod cache;
pub mod colmask;
pub mod config;
pub mod error;
pub mod precompute;

pub use cache::ParamCache;
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use precompute::{NoProgress, PlateOutcome, PrecomputeOptions, PrecomputeReport, Progress};
