//! # Stress Facade
//!
//! Stateful front end over a [`StressField`] for plotting and export: pick a
//! direction or a run, then read its strain or stress. Per-selector results
//! are cached and the cache is rebuilt from scratch whenever the identities
//! of the underlying strains change.
//!
//! ## Selection
//!
//! - unset: reading `strain` or `stress` fails with [`FieldError::NoSelection`]
//! - a direction (`"11"`, `"22"`, `"33"`): strain and stress available
//! - a run number: only strain is available, stress needs every direction
//!
//! ## Consensus reference spacing
//!
//! Each run of each measured direction carries its own reference spacing.
//! Where several runs have a non-NaN value at the same point they must agree,
//! whether they belong to one direction or to several; the consensus is the
//! mean of the values present.
//!
//! ```text
//! vx                 :   0.0  1.0  2.0  3.0  4.0  5.0  6.0  7.0
//! d_ref from strain11:   1.0  1.1  1.1  1.2  1.2  1.2  nan  nan
//! d_ref from strain22:   nan  1.1  1.1  1.2  1.2  nan  nan  nan
//! d_ref from strain33:   nan  nan  1.1  1.2  1.2  1.2  1.2  1.3
//! consensus d_ref    :   1.0  1.1  1.1  1.2  1.2  1.2  1.2  1.3
//! ```

use std::collections::HashMap;
use std::fmt;

use log::{debug, info};
use uuid::Uuid;

use crate::errors::{FieldError, FieldResult};
use crate::field::ScalarFieldSample;
use crate::point_list::PointList;
use crate::strain::{StrainField, D_REFERENCE};
use crate::stress::{Direction, StressField};

/// What the facade currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Direction(Direction),
    Run(String),
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Direction(direction) => write!(f, "{}", direction),
            Selection::Run(run) => write!(f, "{}", run),
        }
    }
}

/// Selection and caching layer over a [`StressField`].
#[derive(Debug, Clone)]
pub struct StressFacade {
    stress: StressField,
    selection: Option<Selection>,
    strain_cache: HashMap<String, ScalarFieldSample>,
    stress_cache: HashMap<String, ScalarFieldSample>,
    cached_identity: [Option<Uuid>; 3],
    d_reference: Option<ScalarFieldSample>,
}

impl StressFacade {
    pub fn new(stress: StressField) -> Self {
        let mut facade = StressFacade {
            cached_identity: stress.identity(),
            stress,
            selection: None,
            strain_cache: HashMap::new(),
            stress_cache: HashMap::new(),
            d_reference: None,
        };
        facade.update_caches();
        facade
    }

    /// Rebuild every cache from the current strains and drop the consensus
    /// reference spacing.
    pub fn invalidate(&mut self) {
        self.update_caches();
    }

    fn update_caches(&mut self) {
        self.strain_cache.clear();
        self.stress_cache.clear();
        for direction in Direction::ALL {
            let key = direction.as_str().to_string();
            self.stress_cache
                .insert(key.clone(), self.stress.stress(direction).clone());
            let strain = match self.stress.strain(direction) {
                Some(strain) => strain.field().clone(),
                None => self.stress.strain_on_support(direction).clone(),
            };
            self.strain_cache.insert(key, strain);
        }
        for &direction in self.stress.stress_type().measured_directions() {
            if let Some(strain) = self.stress.strain(direction) {
                for single in strain.strains() {
                    self.strain_cache
                        .insert(single.run_number().to_string(), single.field().clone());
                }
            }
        }
        self.cached_identity = self.stress.identity();
        self.d_reference = None;
        info!(
            "stress facade caches rebuilt: {} strain and {} stress entries",
            self.strain_cache.len(),
            self.stress_cache.len()
        );
    }

    fn refresh_if_stale(&mut self) {
        if self.cached_identity != self.stress.identity() {
            debug!("strain identities changed, rebuilding caches");
            self.update_caches();
        }
    }

    pub fn stress_field(&self) -> &StressField {
        &self.stress
    }

    /// Mutable access to the owned stress field; caches are rebuilt on the
    /// next read if any strain was replaced.
    pub fn stress_field_mut(&mut self) -> &mut StressField {
        &mut self.stress
    }

    /// Replace the strain along `direction` and invalidate the caches.
    pub fn replace_strain(&mut self, direction: Direction, strain: StrainField) -> FieldResult<()> {
        self.stress.set_strain(direction, strain)?;
        self.invalidate();
        Ok(())
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Pick a direction (`"11"`, `"22"`, `"33"`) or a run number.
    ///
    /// Two-character tokens are directions. Anything else must be a run
    /// number known to some direction.
    pub fn set_selection(&mut self, choice: &str) -> FieldResult<()> {
        let selection = if choice.len() == 2 {
            Selection::Direction(choice.parse()?)
        } else if self.all_runs().iter().any(|run| run == choice) {
            Selection::Run(choice.to_string())
        } else {
            return Err(FieldError::UnknownRun {
                run: choice.to_string(),
            });
        };
        self.selection = Some(selection);
        Ok(())
    }

    pub fn x(&self) -> Vec<f64> {
        self.stress.x()
    }

    pub fn y(&self) -> Vec<f64> {
        self.stress.y()
    }

    pub fn z(&self) -> Vec<f64> {
        self.stress.z()
    }

    /// Strain of the selected direction or run.
    pub fn strain(&mut self) -> FieldResult<&ScalarFieldSample> {
        self.refresh_if_stale();
        let key = self
            .selection
            .as_ref()
            .ok_or(FieldError::NoSelection)?
            .to_string();
        self.strain_cache
            .get(&key)
            .ok_or(FieldError::UnknownRun { run: key })
    }

    /// Stress of the selected direction.
    pub fn stress(&mut self) -> FieldResult<&ScalarFieldSample> {
        self.refresh_if_stale();
        let direction = match &self.selection {
            None => return Err(FieldError::NoSelection),
            Some(Selection::Run(run)) => {
                return Err(FieldError::SelectionNotDirection {
                    selection: run.clone(),
                })
            }
            Some(Selection::Direction(direction)) => *direction,
        };
        self.stress_cache
            .get(direction.as_str())
            .ok_or_else(|| FieldError::internal("stress cache missing a direction"))
    }

    /// Consensus reference spacing over the measured directions.
    ///
    /// Computed on first call and kept until the caches are rebuilt.
    pub fn d_reference(&mut self) -> FieldResult<&ScalarFieldSample> {
        self.refresh_if_stale();
        if self.d_reference.is_none() {
            self.d_reference = Some(self.consensus_d_reference()?);
        }
        self.d_reference
            .as_ref()
            .ok_or_else(|| FieldError::internal("consensus reference spacing not stored"))
    }

    // Every run of every measured direction takes part in the agreement check,
    // so duplicates within one direction are compared too.
    fn consensus_d_reference(&self) -> FieldResult<ScalarFieldSample> {
        let settings = self.stress.settings();
        let d0s = self
            .stress
            .stress_type()
            .measured_directions()
            .iter()
            .filter_map(|&direction| self.stress.strain(direction))
            .map(StrainField::get_d_reference)
            .collect::<FieldResult<Vec<_>>>()?;
        let (first, rest) = d0s
            .split_first()
            .ok_or_else(|| FieldError::internal("no measured direction"))?;
        let all = rest
            .iter()
            .try_fold(first.clone(), |all, d0| all.aggregate(d0))?;

        let groups = all.point_list().distinct_groups();
        let mut values = Vec::with_capacity(groups.len());
        let mut errors = Vec::with_capacity(groups.len());
        let mut points = Vec::with_capacity(groups.len());
        for group in &groups {
            let point = *all
                .point_list()
                .get(group[0])
                .ok_or_else(|| FieldError::internal("reference group outside point list"))?;
            let present: Vec<(f64, f64)> = group
                .iter()
                .map(|&i| (all.values()[i], all.errors()[i]))
                .filter(|(value, _)| !value.is_nan())
                .collect();
            for (k, &(a, _)) in present.iter().enumerate() {
                for &(b, _) in &present[k + 1..] {
                    if !settings.references_agree(a, b) {
                        return Err(FieldError::InconsistentReference {
                            vx: point.vx,
                            vy: point.vy,
                            vz: point.vz,
                            first: a,
                            second: b,
                        });
                    }
                }
            }
            if present.is_empty() {
                values.push(f64::NAN);
                errors.push(f64::NAN);
            } else {
                let count = present.len() as f64;
                values.push(present.iter().map(|(v, _)| v).sum::<f64>() / count);
                errors.push(present.iter().map(|(_, e)| e).sum::<f64>() / count);
            }
            points.push(point);
        }
        debug!(
            "consensus reference spacing on {} points from {} values",
            points.len(),
            all.len()
        );
        let union = PointList::from_points(points, all.point_list().resolution());
        ScalarFieldSample::with_point_list(D_REFERENCE, values, errors, union)
    }

    fn all_runs(&self) -> Vec<String> {
        Direction::ALL
            .iter()
            .flat_map(|&direction| self.runs(direction))
            .collect()
    }

    /// Run numbers contributing to `direction`, in stitching order.
    ///
    /// Empty for '33' unless the stress type is diagonal.
    pub fn runs(&self, direction: Direction) -> Vec<String> {
        self.stress
            .strain(direction)
            .map(|strain| strain.runs().iter().map(u32::to_string).collect())
            .unwrap_or_default()
    }

    pub fn youngs_modulus(&self) -> f64 {
        self.stress.youngs_modulus()
    }

    pub fn poisson_ratio(&self) -> f64 {
        self.stress.poisson_ratio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FuseCriterion;
    use crate::peaks::{DReference, PeakCollection, SampleLogs};
    use crate::settings::FieldSettings;
    use crate::strain::StrainFieldSingle;
    use crate::stress::{ElasticConstants, StressType};

    const NAN: f64 = f64::NAN;

    // Run with a peak at 180° and λ = 2 (d = 1) against the given reference spacings.
    fn single(run: u32, xs: &[f64], d0: &[f64]) -> StrainFieldSingle {
        let n = xs.len();
        let sub_runs: Vec<u32> = (1..=n as u32).collect();
        let peaks = PeakCollection::new(
            run,
            "Fe211",
            sub_runs.clone(),
            vec![180.0; n],
            vec![0.0; n],
            DReference::PerPoint {
                values: d0.to_vec(),
                errors: vec![0.0; n],
            },
        )
        .unwrap();
        let logs = SampleLogs::new(sub_runs, xs.to_vec(), vec![0.0; n], vec![0.0; n], 2.0).unwrap();
        StrainFieldSingle::new(peaks, &logs, &FieldSettings::default()).unwrap()
    }

    fn strain(run: u32, xs: &[f64], d0: &[f64]) -> StrainField {
        StrainField::new(vec![single(run, xs, d0)]).unwrap()
    }

    fn uniform(run: u32, xs: &[f64]) -> StrainField {
        strain(run, xs, &vec![1.0; xs.len()])
    }

    fn constants() -> ElasticConstants {
        ElasticConstants::new(200.0, 0.3).unwrap()
    }

    fn in_plane_facade() -> StressFacade {
        let xs = [0.0, 1.0, 2.0];
        let strain11 = StrainField::new(vec![
            single(1000, &[0.0, 1.0], &[1.0, 1.0]),
            single(1001, &[2.0], &[1.0]),
        ])
        .unwrap();
        let stress = StressField::new(
            strain11,
            uniform(1002, &xs),
            None,
            StressType::InPlaneStress,
            constants(),
        )
        .unwrap();
        StressFacade::new(stress)
    }

    #[test]
    fn test_unselected_reads_fail() {
        let mut facade = in_plane_facade();
        assert!(facade.selection().is_none());
        let err = facade.strain().unwrap_err();
        assert_eq!(err, FieldError::NoSelection);
        assert!(err.to_string().contains("No selection has been entered"));
        assert_eq!(facade.stress().unwrap_err(), FieldError::NoSelection);
    }

    #[test]
    fn test_direction_selection() {
        let mut facade = in_plane_facade();
        facade.set_selection("11").unwrap();
        assert_eq!(facade.selection(), Some(&Selection::Direction(Direction::D11)));
        assert_eq!(facade.strain().unwrap().len(), 3);
        assert_eq!(facade.stress().unwrap().name(), "stress11");

        facade.set_selection("33").unwrap();
        assert_eq!(facade.stress().unwrap().values(), &[0.0, 0.0, 0.0]);
        assert_eq!(facade.strain().unwrap().len(), 3);
    }

    #[test]
    fn test_run_selection() {
        let mut facade = in_plane_facade();
        facade.set_selection("1001").unwrap();
        assert_eq!(facade.selection(), Some(&Selection::Run("1001".to_string())));
        assert_eq!(facade.strain().unwrap().x(), vec![2.0]);
        let err = facade.stress().unwrap_err();
        assert_eq!(err.error_code(), "SELECTION_NOT_DIRECTION");
        assert!(err.to_string().contains("must specify one direction"));
    }

    #[test]
    fn test_bad_selection_rejected_at_assignment() {
        let mut facade = in_plane_facade();
        facade.set_selection("22").unwrap();
        assert_eq!(
            facade.set_selection("12").unwrap_err().error_code(),
            "UNKNOWN_DIRECTION"
        );
        assert_eq!(
            facade.set_selection("4242").unwrap_err().error_code(),
            "UNKNOWN_RUN"
        );
        assert_eq!(facade.selection(), Some(&Selection::Direction(Direction::D22)));
    }

    #[test]
    fn test_runs() {
        let facade = in_plane_facade();
        assert_eq!(facade.runs(Direction::D11), vec!["1000", "1001"]);
        assert_eq!(facade.runs(Direction::D22), vec!["1002"]);
        assert!(facade.runs(Direction::D33).is_empty());
        assert_eq!(facade.youngs_modulus(), 200.0);
        assert_eq!(facade.poisson_ratio(), 0.3);
        assert_eq!(facade.x(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_consensus_reference_with_disjoint_nans() {
        let xs: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let d11 = [1.0, 1.1, 1.1, 1.2, 1.2, 1.2, NAN, NAN];
        let d22 = [NAN, 1.1, 1.1, 1.2, 1.2, NAN, NAN, NAN];
        let d33 = [NAN, NAN, 1.1, 1.2, 1.2, 1.2, 1.2, 1.3];
        let stress = StressField::new(
            strain(1, &xs, &d11),
            strain(2, &xs, &d22),
            Some(strain(3, &xs, &d33)),
            StressType::Diagonal,
            constants(),
        )
        .unwrap();
        let mut facade = StressFacade::new(stress);
        let consensus = facade.d_reference().unwrap();
        assert_eq!(consensus.name(), D_REFERENCE);
        let expected = [1.0, 1.1, 1.1, 1.2, 1.2, 1.2, 1.2, 1.3];
        assert_eq!(consensus.len(), expected.len());
        for (v, e) in consensus.values().iter().zip(expected) {
            assert!((v - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_consensus_normalised_by_contributing_directions() {
        let xs = [0.0, 1.0, 2.0];
        let stress = StressField::new(
            strain(1, &xs, &[1.0, NAN, 1.2]),
            strain(2, &xs, &[1.0, 1.1, NAN]),
            None,
            StressType::InPlaneStrain,
            constants(),
        )
        .unwrap();
        let mut facade = StressFacade::new(stress);
        let consensus = facade.d_reference().unwrap();
        assert!((consensus.values()[0] - 1.0).abs() < 1e-12);
        assert!((consensus.values()[1] - 1.1).abs() < 1e-12);
        assert!((consensus.values()[2] - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_consensus_covers_union_of_points() {
        let stress = StressField::new(
            strain(1, &[0.0, 1.0], &[1.0, 1.0]),
            strain(2, &[1.0, 2.0], &[1.0, NAN]),
            None,
            StressType::InPlaneStress,
            constants(),
        )
        .unwrap();
        let mut facade = StressFacade::new(stress);
        assert_eq!(facade.x(), vec![1.0]);
        let consensus = facade.d_reference().unwrap();
        assert_eq!(consensus.x(), vec![0.0, 1.0, 2.0]);
        assert!(consensus.values()[2].is_nan());
    }

    #[test]
    fn test_disagreeing_references_are_fatal() {
        let xs = [0.0, 1.0];
        let stress = StressField::new(
            strain(1, &xs, &[1.0, 1.1]),
            strain(2, &xs, &[1.0, 1.2]),
            None,
            StressType::InPlaneStress,
            constants(),
        )
        .unwrap();
        let mut facade = StressFacade::new(stress);
        let err = facade.d_reference().unwrap_err();
        assert_eq!(err.error_code(), "INCONSISTENT_REFERENCE");
    }

    #[test]
    fn test_disagreeing_runs_within_direction_are_fatal() {
        // Runs 1 and 2 both scan x = 0 along 11 with different references.
        // Neither fuse criterion may hide the disagreement.
        for (criterion, d22) in [(FuseCriterion::MinError, 1.0), (FuseCriterion::Average, 1.1)] {
            let strain11 = StrainField::new(vec![
                single(1, &[0.0], &[1.0]),
                single(2, &[0.0], &[1.2]),
            ])
            .unwrap();
            let settings = FieldSettings {
                fuse_criterion: criterion,
                ..FieldSettings::default()
            };
            let stress = StressField::with_settings(
                strain11,
                strain(3, &[0.0], &[d22]),
                None,
                StressType::InPlaneStrain,
                constants(),
                settings,
            )
            .unwrap();
            let mut facade = StressFacade::new(stress);
            let err = facade.d_reference().unwrap_err();
            assert_eq!(err.error_code(), "INCONSISTENT_REFERENCE");
            if let FieldError::InconsistentReference { first, second, .. } = err {
                assert_eq!((first, second), (1.0, 1.2));
            }
        }
    }

    #[test]
    fn test_agreeing_runs_within_direction_share_one_point() {
        let strain11 = StrainField::new(vec![
            single(1, &[0.0, 1.0], &[1.1, 1.1]),
            single(2, &[1.0], &[1.1]),
        ])
        .unwrap();
        let stress = StressField::new(
            strain11,
            strain(3, &[0.0, 1.0], &[1.1, 1.1]),
            None,
            StressType::InPlaneStress,
            constants(),
        )
        .unwrap();
        let mut facade = StressFacade::new(stress);
        let consensus = facade.d_reference().unwrap();
        assert_eq!(consensus.x(), vec![0.0, 1.0]);
        assert!(consensus.values().iter().all(|v| (v - 1.1).abs() < 1e-12));
    }

    #[test]
    fn test_replace_strain_invalidates_caches() {
        let mut facade = in_plane_facade();
        facade.set_selection("22").unwrap();
        assert_eq!(facade.strain().unwrap().len(), 3);
        let before = facade.d_reference().unwrap().clone();

        facade
            .replace_strain(Direction::D22, strain(2000, &[0.0, 1.0], &[1.25, 1.25]))
            .unwrap();
        assert_eq!(facade.strain().unwrap().len(), 2);
        assert!((facade.strain().unwrap().values()[0] + 0.2).abs() < 1e-12);
        assert_eq!(facade.runs(Direction::D22), vec!["2000"]);
        assert_eq!(facade.stress().unwrap().len(), 2);
        assert!(facade.d_reference().is_err());
        assert_eq!(before.len(), 3);
    }

    #[test]
    fn test_mutation_through_stress_field_detected() {
        let mut facade = in_plane_facade();
        facade
            .stress_field_mut()
            .set_strain(Direction::D11, uniform(3000, &[1.0]))
            .unwrap();
        facade.set_selection("11").unwrap();
        assert_eq!(facade.strain().unwrap().x(), vec![1.0]);
        facade.set_selection("3000").unwrap();
        assert_eq!(facade.strain().unwrap().len(), 1);
        assert!(facade.set_selection("1000").is_err());
    }
}
