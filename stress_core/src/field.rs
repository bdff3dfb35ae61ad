//! # Scalar Field Samples
//!
//! A named scalar quantity (value and uncertainty) sampled at the points of a
//! [`PointList`]. Missing measurements are NaN; arrays are never shortened to
//! drop a scan point. Set operations return new samples.
//!
//! ## Set Algebra
//!
//! - [`ScalarFieldSample::extract`] - restrict to an index subset
//! - [`ScalarFieldSample::aggregate`] - concatenate, duplicates kept
//! - [`ScalarFieldSample::intersection`] - both operands at their common points, side by side
//! - [`ScalarFieldSample::fuse`] - one value per distinct point
//!
//! ## Example
//!
//! ```rust
//! use stress_core::field::{FuseCriterion, ScalarFieldSample};
//!
//! let a = ScalarFieldSample::new("strain", vec![1.0, 1.01, 1.02], vec![0.1, 0.1, 0.1],
//!     vec![0.0, 1.0, 2.0], vec![0.0; 3], vec![0.0; 3]).unwrap();
//! let b = ScalarFieldSample::new("strain", vec![1.03, 1.04, 1.05], vec![0.2, 0.05, 0.2],
//!     vec![1.0, 2.0, 3.0], vec![0.0; 3], vec![0.0; 3]).unwrap();
//!
//! assert_eq!(a.aggregate(&b).unwrap().len(), 6);
//! let fused = a.fuse(&b, FuseCriterion::MinError).unwrap();
//! assert_eq!(fused.values(), &[1.0, 1.01, 1.04, 1.05]);
//! ```

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{FieldError, FieldResult};
use crate::point_list::PointList;

/// How two measurements of the same point are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuseCriterion {
    /// Keep the measurement with the smaller uncertainty (first one on ties)
    #[default]
    MinError,
    /// Uncertainty-weighted mean
    Average,
}

impl fmt::Display for FuseCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuseCriterion::MinError => write!(f, "min_error"),
            FuseCriterion::Average => write!(f, "average"),
        }
    }
}

/// A scalar quantity with uncertainties sampled on a point list.
///
/// Invariant: `values`, `errors` and `point_list` all have the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarFieldSample {
    name: String,
    values: Vec<f64>,
    errors: Vec<f64>,
    point_list: PointList,
}

impl ScalarFieldSample {
    /// Build a sample from coordinate arrays, with the default point resolution.
    pub fn new(
        name: impl Into<String>,
        values: Vec<f64>,
        errors: Vec<f64>,
        vx: Vec<f64>,
        vy: Vec<f64>,
        vz: Vec<f64>,
    ) -> FieldResult<Self> {
        Self::with_point_list(name, values, errors, PointList::new(vx, vy, vz)?)
    }

    /// Build a sample on an existing point list.
    pub fn with_point_list(
        name: impl Into<String>,
        values: Vec<f64>,
        errors: Vec<f64>,
        point_list: PointList,
    ) -> FieldResult<Self> {
        if errors.len() != values.len() {
            return Err(FieldError::shape_mismatch("errors", values.len(), errors.len()));
        }
        if point_list.len() != values.len() {
            return Err(FieldError::shape_mismatch(
                "point_list",
                values.len(),
                point_list.len(),
            ));
        }
        Ok(ScalarFieldSample {
            name: name.into(),
            values,
            errors,
            point_list,
        })
    }

    /// Same value and error at every point of `point_list`.
    pub fn constant(name: impl Into<String>, value: f64, error: f64, point_list: PointList) -> Self {
        let n = point_list.len();
        ScalarFieldSample {
            name: name.into(),
            values: vec![value; n],
            errors: vec![error; n],
            point_list,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn errors(&self) -> &[f64] {
        &self.errors
    }

    pub fn point_list(&self) -> &PointList {
        &self.point_list
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

    pub fn coordinates(&self) -> Vec<[f64; 3]> {
        self.point_list.coordinates()
    }

    /// Copy of the sample under a different quantity name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        ScalarFieldSample {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Restrict the sample to `indices`, keeping their order.
    pub fn extract(&self, indices: &[usize]) -> FieldResult<Self> {
        let point_list = self.point_list.extract(indices)?;
        Ok(ScalarFieldSample {
            name: self.name.clone(),
            values: indices.iter().map(|&i| self.values[i]).collect(),
            errors: indices.iter().map(|&i| self.errors[i]).collect(),
            point_list,
        })
    }

    /// `self` followed by `other`. Overlapping points are kept twice.
    pub fn aggregate(&self, other: &ScalarFieldSample) -> FieldResult<Self> {
        if self.name != other.name {
            return Err(FieldError::quantity_mismatch(&self.name, &other.name));
        }
        let mut values = self.values.clone();
        values.extend_from_slice(&other.values);
        let mut errors = self.errors.clone();
        errors.extend_from_slice(&other.errors);
        Ok(ScalarFieldSample {
            name: self.name.clone(),
            values,
            errors,
            point_list: self.point_list.aggregate(&other.point_list),
        })
    }

    /// Both operands restricted to their common points.
    ///
    /// The first half of the result holds `self` at the common points, the
    /// second half holds `other` at the matching points, both in the order of
    /// `self`.
    pub fn intersection(&self, other: &ScalarFieldSample) -> FieldResult<Self> {
        let pairs = self.point_list.matching_indices(&other.point_list);
        debug!(
            "intersection of '{}' ({} points) and '{}' ({} points): {} common points",
            self.name,
            self.len(),
            other.name,
            other.len(),
            pairs.len()
        );
        let (mine, theirs): (Vec<usize>, Vec<usize>) = pairs.into_iter().unzip();
        self.extract(&mine)?.aggregate(&other.extract(&theirs)?)
    }

    /// Merge with `other` into one value per distinct point.
    ///
    /// Points measured once keep their value and error. Points measured more
    /// than once are resolved by `criterion`. Points come out in order of first
    /// discovery, `self` before `other`.
    pub fn fuse(&self, other: &ScalarFieldSample, criterion: FuseCriterion) -> FieldResult<Self> {
        self.aggregate(other)?.fused(criterion)
    }

    /// Resolve the duplicate points of this sample by `criterion`.
    pub fn fused(&self, criterion: FuseCriterion) -> FieldResult<Self> {
        let groups = self.point_list.distinct_groups();
        let mut values = Vec::with_capacity(groups.len());
        let mut errors = Vec::with_capacity(groups.len());
        let mut points = Vec::with_capacity(groups.len());
        let mut merged = 0;
        for group in &groups {
            if group.len() > 1 {
                merged += 1;
            }
            let (index, value, error) = match criterion {
                FuseCriterion::MinError => {
                    let i = self.min_error_index(group);
                    (i, self.values[i], self.errors[i])
                }
                FuseCriterion::Average => {
                    let (value, error) = self.weighted_mean(group);
                    (group[0], value, error)
                }
            };
            let point = self
                .point_list
                .get(index)
                .copied()
                .ok_or_else(|| FieldError::internal("fuse group index outside point list"))?;
            values.push(value);
            errors.push(error);
            points.push(point);
        }
        debug!(
            "fused '{}' ({}): {} entries -> {} points, {} merged",
            self.name,
            criterion,
            self.len(),
            groups.len(),
            merged
        );
        Ok(ScalarFieldSample {
            name: self.name.clone(),
            values,
            errors,
            point_list: PointList::from_points(points, self.point_list.resolution()),
        })
    }

    /// Drop the points whose value is NaN.
    pub fn finite(&self) -> FieldResult<Self> {
        let indices: Vec<usize> = (0..self.len())
            .filter(|&i| !self.values[i].is_nan())
            .collect();
        self.extract(&indices)
    }

    // Index of the entry with the smallest error. NaN values lose against any
    // measured value and NaN errors count as infinite. Ties keep the first.
    fn min_error_index(&self, group: &[usize]) -> usize {
        let rank = |i: usize| -> (bool, f64) {
            let error = if self.errors[i].is_nan() {
                f64::INFINITY
            } else {
                self.errors[i]
            };
            (self.values[i].is_nan(), error)
        };
        let mut best = group[0];
        for &i in &group[1..] {
            let (best_nan, best_err) = rank(best);
            let (nan, err) = rank(i);
            if (best_nan && !nan) || (nan == best_nan && err < best_err) {
                best = i;
            }
        }
        best
    }

    // Inverse-variance weighted mean over the measured entries of a group.
    fn weighted_mean(&self, group: &[usize]) -> (f64, f64) {
        let measured: Vec<usize> = group
            .iter()
            .copied()
            .filter(|&i| !self.values[i].is_nan())
            .collect();
        if measured.is_empty() {
            return (f64::NAN, f64::NAN);
        }
        if measured.len() == 1 {
            return (self.values[measured[0]], self.errors[measured[0]]);
        }
        let exact: Vec<usize> = measured
            .iter()
            .copied()
            .filter(|&i| self.errors[i] == 0.0)
            .collect();
        if !exact.is_empty() {
            let mean = exact.iter().map(|&i| self.values[i]).sum::<f64>() / exact.len() as f64;
            return (mean, 0.0);
        }
        if measured.iter().any(|&i| self.errors[i].is_nan()) {
            let mean =
                measured.iter().map(|&i| self.values[i]).sum::<f64>() / measured.len() as f64;
            return (mean, f64::NAN);
        }
        let weights: Vec<f64> = measured
            .iter()
            .map(|&i| 1.0 / (self.errors[i] * self.errors[i]))
            .collect();
        let total: f64 = weights.iter().sum();
        let mean = measured
            .iter()
            .zip(&weights)
            .map(|(&i, w)| w * self.values[i])
            .sum::<f64>()
            / total;
        (mean, 1.0 / total.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(values: &[f64], errors: &[f64], xs: &[f64]) -> ScalarFieldSample {
        let n = xs.len();
        ScalarFieldSample::new(
            "lattice",
            values.to_vec(),
            errors.to_vec(),
            xs.to_vec(),
            vec![0.0; n],
            vec![0.0; n],
        )
        .unwrap()
    }

    // Ten points on the x axis, and ten more whose first three overlap the
    // last three of the first sample within 0.01 mm.
    fn overlapping_pair() -> (ScalarFieldSample, ScalarFieldSample) {
        let make = |values: Vec<f64>, errors: Vec<f64>, xs: Vec<f64>| {
            let n = xs.len();
            let points =
                PointList::with_resolution(xs, vec![0.0; n], vec![0.0; n], 0.01).unwrap();
            ScalarFieldSample::with_point_list("lattice", values, errors, points).unwrap()
        };
        let first = make(
            vec![1.000, 1.010, 1.020, 1.030, 1.040, 1.050, 1.060, 1.070, 1.080, 1.090],
            vec![0.000, 0.001, 0.002, 0.003, 0.004, 0.005, 0.006, 0.007, 0.008, 0.009],
            (0..10).map(|i| i as f64).collect(),
        );
        let second = make(
            vec![1.071, 1.081, 1.091, 1.10, 1.11, 1.12, 1.13, 1.14, 1.15, 1.16],
            vec![0.008, 0.008, 0.008, 0.00, 0.01, 0.02, 0.03, 0.04, 0.05, 0.06],
            vec![7.009, 8.001, 9.005, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0],
        );
        (first, second)
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = ScalarFieldSample::new(
            "lattice",
            vec![1.0, 2.0],
            vec![0.1],
            vec![0.0, 1.0],
            vec![0.0, 0.0],
            vec![0.0, 0.0],
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "SHAPE_MISMATCH");
    }

    #[test]
    fn test_accessors() {
        let (first, _) = overlapping_pair();
        assert_eq!(first.len(), 10);
        assert_eq!(first.name(), "lattice");
        assert_eq!(first.x()[3], 3.0);
        assert_eq!(first.coordinates()[2], [2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_extract() {
        let (first, _) = overlapping_pair();
        let selection = first.extract(&[0, 2, 4, 6, 8]).unwrap();
        assert_eq!(selection.name(), "lattice");
        assert_close(selection.values(), &[1.000, 1.020, 1.040, 1.060, 1.080]);
        assert_close(selection.errors(), &[0.000, 0.002, 0.004, 0.006, 0.008]);
        assert_close(&selection.x(), &[0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_extract_full_range_is_identity() {
        let (first, _) = overlapping_pair();
        let all: Vec<usize> = (0..first.len()).collect();
        assert_eq!(first.extract(&all).unwrap(), first);
    }

    #[test]
    fn test_extract_out_of_range() {
        let (first, _) = overlapping_pair();
        let err = first.extract(&[3, 10]).unwrap_err();
        assert_eq!(err, FieldError::IndexOutOfRange { index: 10, len: 10 });
    }

    #[test]
    fn test_aggregate() {
        let (first, second) = overlapping_pair();
        let all = first.aggregate(&second).unwrap();
        assert_eq!(all.len(), first.len() + second.len());
        assert_eq!(&all.values()[..10], first.values());
        assert_close(&all.values()[9..11], &[1.090, 1.071]);
        assert_close(&all.errors()[9..11], &[0.009, 0.008]);
        assert_close(&all.x()[9..11], &[9.000, 7.009]);
    }

    #[test]
    fn test_aggregate_different_quantities() {
        let (first, second) = overlapping_pair();
        let err = first.aggregate(&second.renamed("strain")).unwrap_err();
        assert_eq!(err.error_code(), "QUANTITY_MISMATCH");
    }

    #[test]
    fn test_intersection() {
        let (first, second) = overlapping_pair();
        let common = first.intersection(&second).unwrap();
        assert_eq!(common.len(), 6);
        assert_eq!(common.name(), "lattice");
        assert_close(common.values(), &[1.070, 1.080, 1.090, 1.071, 1.081, 1.091]);
        assert_close(common.errors(), &[0.007, 0.008, 0.009, 0.008, 0.008, 0.008]);
        assert_close(&common.x(), &[7.000, 8.000, 9.000, 7.009, 8.001, 9.005]);
        for point in common.point_list().iter() {
            assert!(first.point_list().contains(point));
            assert!(second.point_list().contains(point));
        }
    }

    #[test]
    fn test_fuse_min_error() {
        let (first, second) = overlapping_pair();
        let fused = first.fuse(&second, FuseCriterion::MinError).unwrap();
        assert_eq!(fused.len(), 17);
        assert_eq!(fused.name(), "lattice");
        assert_close(&fused.values()[6..11], &[1.060, 1.070, 1.080, 1.091, 1.10]);
        assert_close(&fused.errors()[6..11], &[0.006, 0.007, 0.008, 0.008, 0.0]);
        assert_close(&fused.x()[6..11], &[6.000, 7.000, 8.000, 9.005, 10.00]);
    }

    #[test]
    fn test_fuse_average() {
        let a = sample(&[1.0, 2.0], &[0.1, 0.1], &[0.0, 1.0]);
        let b = sample(&[4.0], &[0.1], &[1.0]);
        let fused = a.fuse(&b, FuseCriterion::Average).unwrap();
        assert_eq!(fused.len(), 2);
        assert_close(fused.values(), &[1.0, 3.0]);
        assert!((fused.errors()[1] - 0.1 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_fuse_average_weights_by_uncertainty() {
        let a = sample(&[1.0], &[0.1], &[0.0]);
        let b = sample(&[2.0], &[0.2], &[0.0]);
        let fused = a.fuse(&b, FuseCriterion::Average).unwrap();
        // weights 100 and 25
        assert!((fused.values()[0] - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_fuse_prefers_measured_over_nan() {
        let a = sample(&[f64::NAN], &[f64::NAN], &[0.0]);
        let b = sample(&[2.0], &[0.5], &[0.0]);
        let fused = a.fuse(&b, FuseCriterion::MinError).unwrap();
        assert_eq!(fused.values(), &[2.0]);
        let averaged = a.fuse(&b, FuseCriterion::Average).unwrap();
        assert_eq!(averaged.values(), &[2.0]);
    }

    #[test]
    fn test_stitched_scenario() {
        let a = sample(&[1.0, 1.01, 1.02], &[0.01, 0.02, 0.03], &[0.0, 1.0, 2.0]);
        let b = sample(&[1.03, 1.04, 1.05], &[0.01, 0.01, 0.01], &[1.0, 2.0, 3.0]);

        let all = a.aggregate(&b).unwrap();
        assert_eq!(all.len(), 6);
        assert_eq!(all.x(), vec![0.0, 1.0, 2.0, 1.0, 2.0, 3.0]);

        let fused = a.fuse(&b, FuseCriterion::MinError).unwrap();
        assert_eq!(fused.len(), 4);
        assert_eq!(fused.x(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_close(fused.values(), &[1.0, 1.03, 1.04, 1.05]);
    }

    #[test]
    fn test_finite() {
        let a = sample(&[1.0, f64::NAN, 3.0], &[0.1, f64::NAN, 0.3], &[0.0, 1.0, 2.0]);
        let finite = a.finite().unwrap();
        assert_eq!(finite.values(), &[1.0, 3.0]);
        assert_eq!(finite.x(), vec![0.0, 2.0]);
    }

    #[test]
    fn test_constant() {
        let points = PointList::new(vec![0.0, 1.0], vec![0.0; 2], vec![0.0; 2]).unwrap();
        let zeros = ScalarFieldSample::constant("stress33", 0.0, 0.0, points);
        assert_eq!(zeros.values(), &[0.0, 0.0]);
        assert_eq!(zeros.errors(), &[0.0, 0.0]);
    }

    #[test]
    fn test_criterion_serialization() {
        let json = serde_json::to_string(&FuseCriterion::MinError).unwrap();
        assert_eq!(json, "\"min_error\"");
        let roundtrip: FuseCriterion = serde_json::from_str("\"average\"").unwrap();
        assert_eq!(roundtrip, FuseCriterion::Average);
    }
}
