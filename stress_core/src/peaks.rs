//! # Peak Collections and Sample Logs
//!
//! Inputs handed over by the peak fitting engine and the reduced workspace.
//! Both are plain serde structs with a `validate()` step, so they can be
//! loaded from JSON as well as built in code.
//!
//! - [`PeakCollection`] - fitted peak centers of one run, per sub-run, with the
//!   reference lattice spacing of that run
//! - [`SampleLogs`] - sample-frame coordinates and wavelength, per sub-run
//!
//! ## Bragg's Law
//!
//! Peak centers are in degrees two-theta. The lattice spacing is
//! `d = λ / (2 sin(2θ / 2))` and its uncertainty follows from the derivative,
//! `σd = d · cot(2θ / 2) · σ(2θ) / 2` with `σ(2θ)` in radians.
//!
//! ```rust
//! use stress_core::peaks::bragg_d_spacing;
//! use stress_core::units::Degrees;
//!
//! let d = bragg_d_spacing(Degrees(180.0), 2.0);
//! assert!((d - 1.0).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{FieldError, FieldResult};
use crate::point_list::PointList;
use crate::units::{Degrees, Radians};

/// Lattice spacing for a peak at `two_theta` and the given wavelength.
pub fn bragg_d_spacing(two_theta: Degrees, wavelength: f64) -> f64 {
    let half: Radians = (two_theta / 2.0).into();
    wavelength / (2.0 * half.0.sin())
}

/// Uncertainty of the Bragg spacing propagated from the peak center uncertainty.
pub fn bragg_d_spacing_error(two_theta: Degrees, two_theta_error: Degrees, wavelength: f64) -> f64 {
    let half: Radians = (two_theta / 2.0).into();
    let sigma: Radians = two_theta_error.into();
    let d = bragg_d_spacing(two_theta, wavelength);
    (d * half.0.cos() / half.0.sin() * sigma.0 / 2.0).abs()
}

/// Reference (unstrained) lattice spacing of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DReference {
    /// One spacing for every sub-run
    Uniform { value: f64, error: f64 },
    /// One spacing per sub-run, NaN where unknown
    PerPoint { values: Vec<f64>, errors: Vec<f64> },
}

impl Default for DReference {
    fn default() -> Self {
        DReference::Uniform {
            value: 1.0,
            error: 0.0,
        }
    }
}

impl DReference {
    /// Values and errors expanded to `n` sub-runs.
    pub fn expand(&self, n: usize) -> FieldResult<(Vec<f64>, Vec<f64>)> {
        match self {
            DReference::Uniform { value, error } => Ok((vec![*value; n], vec![*error; n])),
            DReference::PerPoint { values, errors } => {
                if values.len() != n {
                    return Err(FieldError::shape_mismatch("d_reference.values", n, values.len()));
                }
                if errors.len() != n {
                    return Err(FieldError::shape_mismatch("d_reference.errors", n, errors.len()));
                }
                Ok((values.clone(), errors.clone()))
            }
        }
    }

    fn validate(&self) -> FieldResult<()> {
        let values: &[f64] = match self {
            DReference::Uniform { value, .. } => std::slice::from_ref(value),
            DReference::PerPoint { values, .. } => values,
        };
        if let Some(bad) = values.iter().find(|v| **v <= 0.0) {
            return Err(FieldError::invalid_input(
                "d_reference",
                bad.to_string(),
                "Reference spacing must be positive",
            ));
        }
        Ok(())
    }
}

/// Fitted peak centers of one run.
///
/// ## JSON Example
///
/// ```json
/// {
///   "run_number": 1320,
///   "peak_tag": "Fe211",
///   "sub_runs": [1, 2, 3],
///   "centers": [90.01, 90.02, 89.99],
///   "center_errors": [0.01, 0.01, 0.02],
///   "fit_costs": [1.2, 0.9, 1.4],
///   "d_reference": { "type": "Uniform", "value": 1.1702, "error": 0.0001 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakCollection {
    /// Run the peaks were fitted from
    pub run_number: u32,

    /// Reflection tag (e.g., "Fe211")
    #[serde(default)]
    pub peak_tag: String,

    /// Sub-run numbers, one per scan point
    pub sub_runs: Vec<u32>,

    /// Fitted peak centers (degrees two-theta)
    pub centers: Vec<f64>,

    /// Uncertainty of the fitted peak centers (degrees two-theta)
    pub center_errors: Vec<f64>,

    /// Fit cost (chi²) per sub-run
    #[serde(default)]
    pub fit_costs: Vec<f64>,

    /// Reference lattice spacing
    #[serde(default)]
    pub d_reference: DReference,
}

impl PeakCollection {
    /// Create a collection with zero fit costs.
    pub fn new(
        run_number: u32,
        peak_tag: impl Into<String>,
        sub_runs: Vec<u32>,
        centers: Vec<f64>,
        center_errors: Vec<f64>,
        d_reference: DReference,
    ) -> FieldResult<Self> {
        let collection = PeakCollection {
            run_number,
            peak_tag: peak_tag.into(),
            fit_costs: vec![0.0; sub_runs.len()],
            sub_runs,
            centers,
            center_errors,
            d_reference,
        };
        collection.validate()?;
        Ok(collection)
    }

    /// Validate array lengths and the reference spacing.
    pub fn validate(&self) -> FieldResult<()> {
        let n = self.sub_runs.len();
        if n == 0 {
            return Err(FieldError::invalid_input(
                "sub_runs",
                format!("run {}", self.run_number),
                "A peak collection needs at least one sub-run",
            ));
        }
        if self.centers.len() != n {
            return Err(FieldError::shape_mismatch("centers", n, self.centers.len()));
        }
        if self.center_errors.len() != n {
            return Err(FieldError::shape_mismatch("center_errors", n, self.center_errors.len()));
        }
        if !self.fit_costs.is_empty() && self.fit_costs.len() != n {
            return Err(FieldError::shape_mismatch("fit_costs", n, self.fit_costs.len()));
        }
        self.d_reference.expand(n)?;
        self.d_reference.validate()
    }

    pub fn len(&self) -> usize {
        self.sub_runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_runs.is_empty()
    }

    /// Mask every sub-run whose fit cost is NaN, infinite, or above `max_chi2`.
    ///
    /// Masked sub-runs keep their slot; center and error become NaN.
    /// Returns the number of masked sub-runs.
    pub fn apply_fitting_cost_criteria(&mut self, max_chi2: f64) -> usize {
        let mut masked = 0;
        for (i, cost) in self.fit_costs.iter().enumerate() {
            if !cost.is_finite() || *cost > max_chi2 {
                self.centers[i] = f64::NAN;
                self.center_errors[i] = f64::NAN;
                masked += 1;
            }
        }
        masked
    }

    /// Copy of the collection with another reference spacing.
    pub fn with_d_reference(&self, d_reference: DReference) -> FieldResult<Self> {
        let collection = PeakCollection {
            d_reference,
            ..self.clone()
        };
        collection.validate()?;
        Ok(collection)
    }

    /// Reference spacing values and errors, per sub-run.
    pub fn d_reference_values(&self) -> FieldResult<(Vec<f64>, Vec<f64>)> {
        self.d_reference.expand(self.len())
    }

    /// Lattice spacing (values, errors) of the peak centers, per sub-run.
    ///
    /// `wavelengths` must hold one wavelength per sub-run.
    pub fn dspacing_center(&self, wavelengths: &[f64]) -> FieldResult<(Vec<f64>, Vec<f64>)> {
        if wavelengths.len() != self.len() {
            return Err(FieldError::shape_mismatch("wavelength", self.len(), wavelengths.len()));
        }
        let values = self
            .centers
            .iter()
            .zip(wavelengths)
            .map(|(&center, &wl)| bragg_d_spacing(Degrees(center), wl))
            .collect();
        let errors = self
            .centers
            .iter()
            .zip(&self.center_errors)
            .zip(wavelengths)
            .map(|((&center, &error), &wl)| bragg_d_spacing_error(Degrees(center), Degrees(error), wl))
            .collect();
        Ok((values, errors))
    }
}

/// Wavelength of the incident beam, in the unit of the lattice spacings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Wavelength {
    Uniform(f64),
    PerPoint(Vec<f64>),
}

/// Sample logs of a reduced run: coordinates and wavelength per sub-run.
///
/// ## JSON Example
///
/// ```json
/// {
///   "sub_runs": [1, 2, 3],
///   "vx": [0.0, 1.0, 2.0],
///   "vy": [0.0, 0.0, 0.0],
///   "vz": [0.0, 0.0, 0.0],
///   "wavelength": 1.54
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleLogs {
    pub sub_runs: Vec<u32>,
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub vz: Vec<f64>,
    pub wavelength: Wavelength,
}

impl SampleLogs {
    /// Create sample logs with a uniform wavelength.
    pub fn new(
        sub_runs: Vec<u32>,
        vx: Vec<f64>,
        vy: Vec<f64>,
        vz: Vec<f64>,
        wavelength: f64,
    ) -> FieldResult<Self> {
        let logs = SampleLogs {
            sub_runs,
            vx,
            vy,
            vz,
            wavelength: Wavelength::Uniform(wavelength),
        };
        logs.validate()?;
        Ok(logs)
    }

    /// Validate array lengths and the wavelength.
    pub fn validate(&self) -> FieldResult<()> {
        let n = self.sub_runs.len();
        for (name, log) in [("vx", &self.vx), ("vy", &self.vy), ("vz", &self.vz)] {
            if log.len() != n {
                return Err(FieldError::shape_mismatch(name, n, log.len()));
            }
        }
        let wavelengths: &[f64] = match &self.wavelength {
            Wavelength::Uniform(wl) => std::slice::from_ref(wl),
            Wavelength::PerPoint(wls) => {
                if wls.len() != n {
                    return Err(FieldError::shape_mismatch("wavelength", n, wls.len()));
                }
                wls
            }
        };
        if let Some(bad) = wavelengths.iter().find(|wl| !(**wl > 0.0)) {
            return Err(FieldError::invalid_input(
                "wavelength",
                bad.to_string(),
                "Wavelength must be positive",
            ));
        }
        Ok(())
    }

    /// Positions in the logs of each of `sub_runs`.
    pub fn align(&self, sub_runs: &[u32]) -> FieldResult<Vec<usize>> {
        sub_runs
            .iter()
            .map(|sub_run| {
                self.sub_runs
                    .iter()
                    .position(|s| s == sub_run)
                    .ok_or_else(|| {
                        FieldError::invalid_input(
                            "sub_runs",
                            sub_run.to_string(),
                            "Sub-run is missing from the sample logs",
                        )
                    })
            })
            .collect()
    }

    /// Wavelength at each of the log positions in `indices`.
    pub fn wavelengths(&self, indices: &[usize]) -> FieldResult<Vec<f64>> {
        let n = self.sub_runs.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
            return Err(FieldError::IndexOutOfRange { index: bad, len: n });
        }
        match &self.wavelength {
            Wavelength::Uniform(wl) => Ok(vec![*wl; indices.len()]),
            Wavelength::PerPoint(wls) => indices
                .iter()
                .map(|&i| {
                    wls.get(i).copied().ok_or(FieldError::IndexOutOfRange {
                        index: i,
                        len: wls.len(),
                    })
                })
                .collect(),
        }
    }

    /// Points at the log positions in `indices`.
    pub fn point_list(&self, indices: &[usize], resolution: f64) -> FieldResult<PointList> {
        let pick = |log: &[f64]| -> FieldResult<Vec<f64>> {
            indices
                .iter()
                .map(|&i| {
                    log.get(i).copied().ok_or(FieldError::IndexOutOfRange {
                        index: i,
                        len: log.len(),
                    })
                })
                .collect()
        };
        PointList::with_resolution(pick(&self.vx)?, pick(&self.vy)?, pick(&self.vz)?, resolution)
    }
}
