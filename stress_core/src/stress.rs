//! # Stress Fields
//!
//! Normal stresses from normal strains measured along up to three orthogonal
//! directions, for an isotropic linear-elastic solid. The measurement geometry
//! ([`StressType`]) decides which reduction of Hooke's law applies:
//!
//! - `diagonal`: ε11, ε22, ε33 measured,
//!   `σii = E/(1+ν) · (εii + ν/(1-2ν) · (ε11 + ε22 + ε33))`
//! - `in_plane_stress`: σ33 = 0, so `ε33 = -ν/(1-ν) · (ε11 + ε22)` and
//!   `σ11 = E/(1-ν²) · (ε11 + ν ε22)`
//! - `in_plane_strain`: ε33 = 0, σ33 follows from ε11 and ε22
//!
//! Stresses exist only where every measured direction has a point: the stress
//! support is the intersection of the (fused) strain point lists.
//!
//! ## Example
//!
//! ```rust
//! use stress_core::peaks::{DReference, PeakCollection, SampleLogs};
//! use stress_core::settings::FieldSettings;
//! use stress_core::strain::StrainField;
//! use stress_core::stress::{Direction, ElasticConstants, StressField, StressType};
//!
//! let settings = FieldSettings::default();
//! let logs = SampleLogs::new(vec![1, 2], vec![0.0, 1.0], vec![0.0; 2], vec![0.0; 2], 2.0).unwrap();
//! let strain = |run| {
//!     let peaks = PeakCollection::new(run, "Fe211", vec![1, 2], vec![180.0; 2], vec![0.0; 2],
//!         DReference::Uniform { value: 1.0, error: 0.0 }).unwrap();
//!     StrainField::from_run(peaks, &logs, &settings).unwrap()
//! };
//!
//! let constants = ElasticConstants::new(200.0, 0.3).unwrap();
//! let stress = StressField::new(strain(1), strain(2), None, StressType::InPlaneStress, constants).unwrap();
//! assert_eq!(stress.stress(Direction::D33).values(), &[0.0, 0.0]);
//! ```

use std::fmt;
use std::str::FromStr;

use log::info;
use nalgebra::{matrix, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{FieldError, FieldResult};
use crate::field::ScalarFieldSample;
use crate::point_list::PointList;
use crate::settings::FieldSettings;
use crate::strain::{StrainField, STRAIN};

/// Scan direction of a strain measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "11")]
    D11,
    #[serde(rename = "22")]
    D22,
    #[serde(rename = "33")]
    D33,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::D11, Direction::D22, Direction::D33];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::D11 => "11",
            Direction::D22 => "22",
            Direction::D33 => "33",
        }
    }

    /// Position of the direction in (11, 22, 33)
    pub fn index(&self) -> usize {
        match self {
            Direction::D11 => 0,
            Direction::D22 => 1,
            Direction::D33 => 2,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "11" => Ok(Direction::D11),
            "22" => Ok(Direction::D22),
            "33" => Ok(Direction::D33),
            _ => Err(FieldError::UnknownDirection {
                token: s.to_string(),
            }),
        }
    }
}

/// Measurement geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressType {
    /// Normal strains measured along all three directions
    #[default]
    Diagonal,
    /// Out-of-plane stress is zero; ε11 and ε22 measured
    InPlaneStress,
    /// Out-of-plane strain is zero; ε11 and ε22 measured
    InPlaneStrain,
}

impl StressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StressType::Diagonal => "diagonal",
            StressType::InPlaneStress => "in_plane_stress",
            StressType::InPlaneStrain => "in_plane_strain",
        }
    }

    /// Directions along which strain is measured
    pub fn measured_directions(&self) -> &'static [Direction] {
        match self {
            StressType::Diagonal => &Direction::ALL,
            StressType::InPlaneStress | StressType::InPlaneStrain => {
                &[Direction::D11, Direction::D22]
            }
        }
    }
}

impl fmt::Display for StressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Isotropic elastic constants. Stresses come out in the unit of the modulus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticConstants {
    /// Young's modulus E
    pub youngs_modulus: f64,
    /// Poisson ratio ν
    pub poisson_ratio: f64,
}

impl ElasticConstants {
    pub fn new(youngs_modulus: f64, poisson_ratio: f64) -> FieldResult<Self> {
        let constants = ElasticConstants {
            youngs_modulus,
            poisson_ratio,
        };
        constants.validate()?;
        Ok(constants)
    }

    /// Validate E > 0 and -1 < ν < 0.5.
    pub fn validate(&self) -> FieldResult<()> {
        if !(self.youngs_modulus > 0.0) {
            return Err(FieldError::invalid_input(
                "youngs_modulus",
                self.youngs_modulus.to_string(),
                "Young's modulus must be positive",
            ));
        }
        if !(self.poisson_ratio > -1.0 && self.poisson_ratio < 0.5) {
            return Err(FieldError::invalid_input(
                "poisson_ratio",
                self.poisson_ratio.to_string(),
                "Poisson ratio must lie in (-1, 0.5)",
            ));
        }
        Ok(())
    }

    /// Matrix mapping (ε11, ε22, ε33) to (σ11, σ22, σ33).
    ///
    /// For the in-plane types the ε33 column is zero: ε33 is not measured.
    pub fn stiffness(&self, stress_type: StressType) -> Matrix3<f64> {
        let (e, nu) = (self.youngs_modulus, self.poisson_ratio);
        match stress_type {
            StressType::Diagonal => {
                let shear = e / (1.0 + nu);
                let lame = shear * nu / (1.0 - 2.0 * nu);
                matrix![
                    shear + lame, lame, lame;
                    lame, shear + lame, lame;
                    lame, lame, shear + lame;
                ]
            }
            StressType::InPlaneStrain => {
                let shear = e / (1.0 + nu);
                let lame = shear * nu / (1.0 - 2.0 * nu);
                matrix![
                    shear + lame, lame, 0.0;
                    lame, shear + lame, 0.0;
                    lame, lame, 0.0;
                ]
            }
            StressType::InPlaneStress => {
                let plane = e / (1.0 - nu * nu);
                matrix![
                    plane, plane * nu, 0.0;
                    plane * nu, plane, 0.0;
                    0.0, 0.0, 0.0;
                ]
            }
        }
    }

    /// Row mapping (ε11, ε22, ε33) to the out-of-plane strain implied by the geometry.
    pub fn implied_strain33(&self, stress_type: StressType) -> Vector3<f64> {
        let nu = self.poisson_ratio;
        match stress_type {
            StressType::Diagonal => Vector3::new(0.0, 0.0, 1.0),
            StressType::InPlaneStress => {
                let k = -nu / (1.0 - nu);
                Vector3::new(k, k, 0.0)
            }
            StressType::InPlaneStrain => Vector3::zeros(),
        }
    }
}

/// Stress components derived from strains along two or three directions.
#[derive(Debug, Clone)]
pub struct StressField {
    strain11: StrainField,
    strain22: StrainField,
    strain33: Option<StrainField>,
    stress_type: StressType,
    constants: ElasticConstants,
    settings: FieldSettings,
    point_list: PointList,
    strains: [ScalarFieldSample; 3],
    stresses: [ScalarFieldSample; 3],
}

impl StressField {
    /// Stress from strains, with the default settings.
    ///
    /// `strain33` is required for [`StressType::Diagonal`] and must be `None`
    /// for the in-plane types.
    pub fn new(
        strain11: StrainField,
        strain22: StrainField,
        strain33: Option<StrainField>,
        stress_type: StressType,
        constants: ElasticConstants,
    ) -> FieldResult<Self> {
        Self::with_settings(
            strain11,
            strain22,
            strain33,
            stress_type,
            constants,
            FieldSettings::default(),
        )
    }

    pub fn with_settings(
        strain11: StrainField,
        strain22: StrainField,
        strain33: Option<StrainField>,
        stress_type: StressType,
        constants: ElasticConstants,
        settings: FieldSettings,
    ) -> FieldResult<Self> {
        constants.validate()?;
        settings.validate()?;
        match (stress_type, &strain33) {
            (StressType::Diagonal, None) => {
                return Err(FieldError::missing_direction("33", stress_type.as_str()));
            }
            (StressType::InPlaneStress | StressType::InPlaneStrain, Some(_)) => {
                return Err(FieldError::invalid_input(
                    "strain33",
                    stress_type.as_str(),
                    "The out-of-plane strain is not measured for in-plane stress types",
                ));
            }
            _ => {}
        }

        let measured = [Some(&strain11), Some(&strain22), strain33.as_ref()]
            .into_iter()
            .flatten()
            .map(|strain| strain.fused(settings.fuse_criterion))
            .collect::<FieldResult<Vec<_>>>()?;
        let point_list = measured[1..]
            .iter()
            .fold(measured[0].point_list().clone(), |support, field| {
                support.intersection(field.point_list())
            });
        let on_support = measured
            .iter()
            .map(|field| restrict(field, &point_list))
            .collect::<FieldResult<Vec<_>>>()?;

        let (strains, stresses) = evaluate(&on_support, &point_list, stress_type, &constants)?;
        info!(
            "{} stress evaluated on {} common points (E = {}, nu = {})",
            stress_type,
            point_list.len(),
            constants.youngs_modulus,
            constants.poisson_ratio
        );

        Ok(StressField {
            strain11,
            strain22,
            strain33,
            stress_type,
            constants,
            settings,
            point_list,
            strains,
            stresses,
        })
    }

    /// Replace the strain along `direction` and recompute every component.
    pub fn set_strain(&mut self, direction: Direction, strain: StrainField) -> FieldResult<()> {
        let mut strain11 = self.strain11.clone();
        let mut strain22 = self.strain22.clone();
        let mut strain33 = self.strain33.clone();
        match direction {
            Direction::D11 => strain11 = strain,
            Direction::D22 => strain22 = strain,
            Direction::D33 => strain33 = Some(strain),
        }
        *self = StressField::with_settings(
            strain11,
            strain22,
            strain33,
            self.stress_type,
            self.constants,
            self.settings.clone(),
        )?;
        Ok(())
    }

    /// Identities of the constituent strains, in (11, 22, 33) order
    pub fn identity(&self) -> [Option<Uuid>; 3] {
        [
            Some(self.strain11.id()),
            Some(self.strain22.id()),
            self.strain33.as_ref().map(StrainField::id),
        ]
    }

    /// Measured strain along `direction`, `None` for an unmeasured '33'.
    pub fn strain(&self, direction: Direction) -> Option<&StrainField> {
        match direction {
            Direction::D11 => Some(&self.strain11),
            Direction::D22 => Some(&self.strain22),
            Direction::D33 => self.strain33.as_ref(),
        }
    }

    /// Strain along `direction` on the stress support.
    ///
    /// For the in-plane types '33' is the strain implied by the geometry.
    pub fn strain_on_support(&self, direction: Direction) -> &ScalarFieldSample {
        &self.strains[direction.index()]
    }

    pub fn stress(&self, direction: Direction) -> &ScalarFieldSample {
        &self.stresses[direction.index()]
    }

    pub fn stress11(&self) -> &ScalarFieldSample {
        self.stress(Direction::D11)
    }

    pub fn stress22(&self) -> &ScalarFieldSample {
        self.stress(Direction::D22)
    }

    pub fn stress33(&self) -> &ScalarFieldSample {
        self.stress(Direction::D33)
    }

    /// Von Mises equivalent stress of the three normal components.
    pub fn von_mises(&self) -> FieldResult<ScalarFieldSample> {
        let [s11, s22, s33] = &self.stresses;
        let mut values = Vec::with_capacity(self.len());
        let mut errors = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            let s = Vector3::new(s11.values()[i], s22.values()[i], s33.values()[i]);
            let e = Vector3::new(s11.errors()[i], s22.errors()[i], s33.errors()[i]);
            let vm = (0.5
                * ((s.x - s.y).powi(2) + (s.y - s.z).powi(2) + (s.z - s.x).powi(2)))
            .sqrt();
            let gradient = if vm > 0.0 {
                Vector3::new(2.0 * s.x - s.y - s.z, 2.0 * s.y - s.z - s.x, 2.0 * s.z - s.x - s.y)
                    / (2.0 * vm)
            } else {
                Vector3::zeros()
            };
            values.push(vm);
            errors.push(gradient.component_mul(&e).norm());
        }
        ScalarFieldSample::with_point_list("von_mises", values, errors, self.point_list.clone())
    }

    pub fn point_list(&self) -> &PointList {
        &self.point_list
    }

    pub fn len(&self) -> usize {
        self.point_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.point_list.is_empty()
    }

    pub fn x(&self) -> Vec<f64> {
        self.point_list.vx()
    }

    pub fn y(&self) -> Vec<f64> {
        self.point_list.vy()
    }

    pub fn z(&self) -> Vec<f64> {
        self.point_list.vz()
    }

    pub fn stress_type(&self) -> StressType {
        self.stress_type
    }

    pub fn constants(&self) -> ElasticConstants {
        self.constants
    }

    pub fn youngs_modulus(&self) -> f64 {
        self.constants.youngs_modulus
    }

    pub fn poisson_ratio(&self) -> f64 {
        self.constants.poisson_ratio
    }

    pub fn settings(&self) -> &FieldSettings {
        &self.settings
    }
}

// Values of `field` at every point of `support`, relabelled with the support's points.
fn restrict(field: &ScalarFieldSample, support: &PointList) -> FieldResult<ScalarFieldSample> {
    let indices: Vec<usize> = support
        .matching_indices(field.point_list())
        .into_iter()
        .map(|(_, j)| j)
        .collect();
    if indices.len() != support.len() {
        return Err(FieldError::internal(
            "stress support point missing from a contributing strain",
        ));
    }
    let picked = field.extract(&indices)?;
    ScalarFieldSample::with_point_list(
        field.name(),
        picked.values().to_vec(),
        picked.errors().to_vec(),
        support.clone(),
    )
}

// Strain and stress components on the support, from the measured strains
// (11, 22 and, for diagonal, 33).
fn evaluate(
    measured: &[ScalarFieldSample],
    support: &PointList,
    stress_type: StressType,
    constants: &ElasticConstants,
) -> FieldResult<([ScalarFieldSample; 3], [ScalarFieldSample; 3])> {
    let n = support.len();
    let component = |k: usize, i: usize| -> (f64, f64) {
        measured
            .get(k)
            .map_or((0.0, 0.0), |f| (f.values()[i], f.errors()[i]))
    };

    let stiffness = constants.stiffness(stress_type);
    let stiffness_sq = stiffness.component_mul(&stiffness);
    let implied = constants.implied_strain33(stress_type);

    let mut sigma = [
        (Vec::with_capacity(n), Vec::with_capacity(n)),
        (Vec::with_capacity(n), Vec::with_capacity(n)),
        (Vec::with_capacity(n), Vec::with_capacity(n)),
    ];
    let mut strain33 = (Vec::with_capacity(n), Vec::with_capacity(n));
    for i in 0..n {
        let (e11, s11) = component(0, i);
        let (e22, s22) = component(1, i);
        let (e33, s33) = component(2, i);
        let eps = Vector3::new(e11, e22, e33);
        let err_sq = Vector3::new(s11 * s11, s22 * s22, s33 * s33);

        let stress = stiffness * eps;
        let stress_err = (stiffness_sq * err_sq).map(f64::sqrt);
        for (k, (values, errors)) in sigma.iter_mut().enumerate() {
            values.push(stress[k]);
            errors.push(stress_err[k]);
        }
        strain33.0.push(implied.dot(&eps));
        strain33.1.push(implied.component_mul(&implied).dot(&err_sq).sqrt());
    }

    let [(v11, e11), (v22, e22), (v33, e33)] = sigma;
    let stress11 = ScalarFieldSample::with_point_list("stress11", v11, e11, support.clone())?;
    let stress22 = ScalarFieldSample::with_point_list("stress22", v22, e22, support.clone())?;
    let stress33 = match stress_type {
        StressType::InPlaneStress => ScalarFieldSample::constant("stress33", 0.0, 0.0, support.clone()),
        _ => ScalarFieldSample::with_point_list("stress33", v33, e33, support.clone())?,
    };

    let strain33 = match stress_type {
        StressType::Diagonal => measured
            .get(2)
            .cloned()
            .ok_or_else(|| FieldError::missing_direction("33", stress_type.as_str()))?,
        StressType::InPlaneStrain => ScalarFieldSample::constant(STRAIN, 0.0, 0.0, support.clone()),
        StressType::InPlaneStress => {
            ScalarFieldSample::with_point_list(STRAIN, strain33.0, strain33.1, support.clone())?
        }
    };

    Ok((
        [measured[0].clone(), measured[1].clone(), strain33],
        [stress11, stress22, stress33],
    ))
}
