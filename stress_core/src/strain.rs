//! # Strain Fields
//!
//! Strain is the relative change of the lattice spacing against the reference
//! spacing, `ε = (d - d0) / d0`. The relative variances of `d` and `d0` are
//! independent and add up:
//!
//! ```text
//! σε = (d / d0) · sqrt((σd / d)² + (σd0 / d0)²)
//! ```
//!
//! - [`StrainFieldSingle`] - strain of one run
//! - [`StrainField`] - strain stitched from one or more runs, in run order.
//!   Points scanned by several runs are kept once per run until fused.
//!
//! ## Example
//!
//! ```rust
//! use stress_core::peaks::{DReference, PeakCollection, SampleLogs};
//! use stress_core::settings::FieldSettings;
//! use stress_core::strain::StrainField;
//!
//! let peaks = PeakCollection::new(1234, "Fe211", vec![1, 2], vec![180.0, 180.0], vec![0.0, 0.0],
//!     DReference::Uniform { value: 1.0, error: 0.0 }).unwrap();
//! let logs = SampleLogs::new(vec![1, 2], vec![0.0, 1.0], vec![0.0; 2], vec![0.0; 2], 2.0).unwrap();
//!
//! let strain = StrainField::from_run(peaks, &logs, &FieldSettings::default()).unwrap();
//! assert_eq!(strain.runs(), vec![1234]);
//! assert!(strain.values().iter().all(|v| v.abs() < 1e-12));
//! ```

use log::{debug, warn};
use uuid::Uuid;

use crate::errors::{FieldError, FieldResult};
use crate::field::{FuseCriterion, ScalarFieldSample};
use crate::peaks::{DReference, PeakCollection, SampleLogs};
use crate::point_list::PointList;
use crate::settings::FieldSettings;

/// Quantity name of strain samples
pub const STRAIN: &str = "strain";

/// Quantity name of reference spacing samples
pub const D_REFERENCE: &str = "d-reference";

/// Strain of a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct StrainFieldSingle {
    peak_collection: PeakCollection,
    wavelengths: Vec<f64>,
    field: ScalarFieldSample,
    d_reference: ScalarFieldSample,
}

impl StrainFieldSingle {
    /// Strain of the run in `peaks`, located with `logs`.
    ///
    /// When `settings.max_chi2` is set, badly fitted sub-runs are masked with NaN.
    pub fn new(
        mut peaks: PeakCollection,
        logs: &SampleLogs,
        settings: &FieldSettings,
    ) -> FieldResult<Self> {
        settings.validate()?;
        peaks.validate()?;
        logs.validate()?;
        if let Some(max_chi2) = settings.max_chi2 {
            let masked = peaks.apply_fitting_cost_criteria(max_chi2);
            if masked > 0 {
                warn!(
                    "run {}: {} of {} sub-runs masked by fit cost above {}",
                    peaks.run_number,
                    masked,
                    peaks.len(),
                    max_chi2
                );
            }
        }
        let indices = logs.align(&peaks.sub_runs)?;
        let point_list = logs.point_list(&indices, settings.point_resolution)?;
        let wavelengths = logs.wavelengths(&indices)?;
        Self::compute(peaks, wavelengths, point_list)
    }

    fn compute(
        peak_collection: PeakCollection,
        wavelengths: Vec<f64>,
        point_list: PointList,
    ) -> FieldResult<Self> {
        let (d, d_err) = peak_collection.dspacing_center(&wavelengths)?;
        let (d0, d0_err) = peak_collection.d_reference_values()?;

        let mut values = Vec::with_capacity(d.len());
        let mut errors = Vec::with_capacity(d.len());
        for i in 0..d.len() {
            let ratio = d[i] / d0[i];
            values.push(ratio - 1.0);
            let relative = (d_err[i] / d[i]).powi(2) + (d0_err[i] / d0[i]).powi(2);
            errors.push(ratio.abs() * relative.sqrt());
        }
        debug!(
            "run {}: strain computed on {} points",
            peak_collection.run_number,
            values.len()
        );

        let field = ScalarFieldSample::with_point_list(STRAIN, values, errors, point_list.clone())?;
        let d_reference = ScalarFieldSample::with_point_list(D_REFERENCE, d0, d0_err, point_list)?;
        Ok(StrainFieldSingle {
            peak_collection,
            wavelengths,
            field,
            d_reference,
        })
    }

    /// Strain of the same run against another reference spacing.
    pub fn with_d_reference(&self, d_reference: DReference) -> FieldResult<Self> {
        let peaks = self.peak_collection.with_d_reference(d_reference)?;
        Self::compute(peaks, self.wavelengths.clone(), self.field.point_list().clone())
    }

    pub fn run_number(&self) -> u32 {
        self.peak_collection.run_number
    }

    pub fn peak_collection(&self) -> &PeakCollection {
        &self.peak_collection
    }

    pub fn field(&self) -> &ScalarFieldSample {
        &self.field
    }

    pub fn len(&self) -> usize {
        self.field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_empty()
    }

    /// Reference spacing of the run, on the run's points.
    pub fn get_d_reference(&self) -> &ScalarFieldSample {
        &self.d_reference
    }
}

/// Strain stitched from one or more runs.
///
/// Every construction gets a fresh identity; clones share it. The identity
/// tells caches whether they still describe the same strain.
#[derive(Debug, Clone, PartialEq)]
pub struct StrainField {
    id: Uuid,
    strains: Vec<StrainFieldSingle>,
    field: ScalarFieldSample,
    origins: Vec<usize>,
}

impl StrainField {
    /// Stitch `strains` in the given order.
    pub fn new(strains: Vec<StrainFieldSingle>) -> FieldResult<Self> {
        let (first, rest) = strains.split_first().ok_or_else(|| {
            FieldError::invalid_input("strains", "[]", "A strain field needs at least one run")
        })?;
        let mut field = first.field.clone();
        for strain in rest {
            field = field.aggregate(&strain.field)?;
        }
        let origins = strains
            .iter()
            .enumerate()
            .flat_map(|(i, strain)| std::iter::repeat(i).take(strain.len()))
            .collect();
        Ok(StrainField {
            id: Uuid::new_v4(),
            strains,
            field,
            origins,
        })
    }

    /// Strain of a single run.
    pub fn from_run(
        peaks: PeakCollection,
        logs: &SampleLogs,
        settings: &FieldSettings,
    ) -> FieldResult<Self> {
        Self::new(vec![StrainFieldSingle::new(peaks, logs, settings)?])
    }

    /// Runs of `self` followed by the runs of `other`.
    pub fn stitch(&self, other: &StrainField) -> FieldResult<Self> {
        let mut strains = self.strains.clone();
        strains.extend(other.strains.iter().cloned());
        Self::new(strains)
    }

    /// Recompute every run against another reference spacing.
    ///
    /// A per-point reference must cover all points of the stitched field,
    /// in stitched order.
    pub fn with_d_reference(&self, d_reference: &DReference) -> FieldResult<Self> {
        let strains = match d_reference {
            DReference::Uniform { .. } => self
                .strains
                .iter()
                .map(|s| s.with_d_reference(d_reference.clone()))
                .collect::<FieldResult<Vec<_>>>()?,
            DReference::PerPoint { .. } => {
                let (values, errors) = d_reference.expand(self.len())?;
                let mut start = 0;
                let mut strains = Vec::with_capacity(self.strains.len());
                for strain in &self.strains {
                    let end = start + strain.len();
                    strains.push(strain.with_d_reference(DReference::PerPoint {
                        values: values[start..end].to_vec(),
                        errors: errors[start..end].to_vec(),
                    })?);
                    start = end;
                }
                strains
            }
        };
        Self::new(strains)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn field(&self) -> &ScalarFieldSample {
        &self.field
    }

    pub fn values(&self) -> &[f64] {
        self.field.values()
    }

    pub fn errors(&self) -> &[f64] {
        self.field.errors()
    }

    pub fn point_list(&self) -> &PointList {
        self.field.point_list()
    }

    pub fn len(&self) -> usize {
        self.field.len()
    }

    pub fn is_empty(&self) -> bool {
        self.field.is_empty()
    }

    pub fn strains(&self) -> &[StrainFieldSingle] {
        &self.strains
    }

    pub fn peak_collections(&self) -> Vec<&PeakCollection> {
        self.strains.iter().map(|s| s.peak_collection()).collect()
    }

    /// Run numbers, in stitching order
    pub fn runs(&self) -> Vec<u32> {
        self.strains.iter().map(|s| s.run_number()).collect()
    }

    /// For each point, the position in [`StrainField::strains`] of the run it came from
    pub fn origins(&self) -> &[usize] {
        &self.origins
    }

    /// For each point, the run number it came from
    pub fn run_numbers(&self) -> Vec<u32> {
        self.origins
            .iter()
            .map(|&i| self.strains[i].run_number())
            .collect()
    }

    /// Reference spacing of every run, stitched like the strain.
    pub fn get_d_reference(&self) -> FieldResult<ScalarFieldSample> {
        let (first, rest) = self
            .strains
            .split_first()
            .ok_or_else(|| FieldError::internal("strain field without runs"))?;
        let mut d_reference = first.get_d_reference().clone();
        for strain in rest {
            d_reference = d_reference.aggregate(strain.get_d_reference())?;
        }
        Ok(d_reference)
    }

    /// One strain value per distinct point.
    pub fn fused(&self, criterion: FuseCriterion) -> FieldResult<ScalarFieldSample> {
        self.field.fused(criterion)
    }
}
