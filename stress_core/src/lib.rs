//! # stress_core - Diffraction Strain and Stress Field Engine
//!
//! `stress_core` reduces per-point diffraction peak fits into spatially aligned
//! scalar fields and derives normal stresses from the strains measured along
//! up to three orthogonal directions.
//!
//! ## Design Philosophy
//!
//! - **Pure**: No file I/O; inputs are plain structs, outputs are new fields
//! - **NaN for missing**: A missing measurement is NaN, never a shorter array
//! - **One matching rule**: Every set operation compares points with the same tolerance
//! - **Rich Errors**: Structured error types, not just strings
//!
//! ## Quick Start
//!
//! ```rust
//! use stress_core::facade::StressFacade;
//! use stress_core::peaks::{DReference, PeakCollection, SampleLogs};
//! use stress_core::settings::FieldSettings;
//! use stress_core::strain::StrainField;
//! use stress_core::stress::{ElasticConstants, StressField, StressType};
//!
//! let settings = FieldSettings::default();
//! let logs = SampleLogs::new(vec![1, 2, 3], vec![0.0, 1.0, 2.0], vec![0.0; 3], vec![0.0; 3], 2.0)?;
//! let strain = |run, center| -> stress_core::FieldResult<StrainField> {
//!     let peaks = PeakCollection::new(run, "Fe211", vec![1, 2, 3], vec![center; 3], vec![0.01; 3],
//!         DReference::Uniform { value: 1.0, error: 0.0 })?;
//!     StrainField::from_run(peaks, &logs, &settings)
//! };
//!
//! let stress = StressField::new(
//!     strain(1320, 179.0)?,
//!     strain(1321, 179.5)?,
//!     Some(strain(1322, 180.0)?),
//!     StressType::Diagonal,
//!     ElasticConstants::new(200.0, 0.3)?,
//! )?;
//!
//! let mut facade = StressFacade::new(stress);
//! facade.set_selection("11")?;
//! assert_eq!(facade.stress()?.len(), 3);
//! # Ok::<(), stress_core::FieldError>(())
//! ```
//!
//! ## Modules
//!
//! - [`point_list`] - Sample points and tolerant set operations
//! - [`field`] - Scalar field samples and their set algebra
//! - [`peaks`] - Peak collections, sample logs, Bragg's law
//! - [`strain`] - Strain of single runs and stitched runs
//! - [`stress`] - Hooke's law per measurement geometry
//! - [`facade`] - Direction/run selection with caching
//! - [`settings`] - Tolerances and policies
//! - [`units`] - Type-safe unit wrappers
//! - [`errors`] - Structured error types

pub mod errors;
pub mod facade;
pub mod field;
pub mod peaks;
pub mod point_list;
pub mod settings;
pub mod strain;
pub mod stress;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use errors::{FieldError, FieldResult};
pub use facade::{Selection, StressFacade};
pub use field::{FuseCriterion, ScalarFieldSample};
pub use point_list::{Point, PointList};
pub use settings::FieldSettings;
pub use strain::{StrainField, StrainFieldSingle};
pub use stress::{Direction, ElasticConstants, StressField, StressType};
