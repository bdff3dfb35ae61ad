//! # Point Lists
//!
//! Ordered collections of sample-frame coordinates. Two points are the same
//! physical point when every coordinate differs by no more than the list's
//! resolution. All set operations of the crate (intersection, fuse, consensus)
//! go through [`Point::matches`], so they share one definition of "same point".
//!
//! Point lists built from a single run hold unique points. Aggregation keeps
//! duplicates on purpose: stitched runs may scan the same location twice, and
//! the duplicates are resolved later by a fuse.
//!
//! ## Example
//!
//! ```rust
//! use stress_core::point_list::PointList;
//!
//! let a = PointList::new(vec![0.0, 1.0, 2.0], vec![0.0; 3], vec![0.0; 3]).unwrap();
//! let b = PointList::new(vec![1.0005, 2.0, 3.0], vec![0.0; 3], vec![0.0; 3]).unwrap();
//!
//! let common = a.intersection(&b);
//! assert_eq!(common.vx(), vec![1.0, 2.0]);
//! assert_eq!(a.aggregate(&b).len(), 6);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{FieldError, FieldResult};

/// Default per-axis tolerance, in the coordinate unit (typically mm)
pub const DEFAULT_POINT_RESOLUTION: f64 = 1e-3;

/// A point in the sample frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
}

impl Point {
    pub fn new(vx: f64, vy: f64, vz: f64) -> Self {
        Point { vx, vy, vz }
    }

    /// True when all three coordinate differences are within `resolution`.
    ///
    /// NaN coordinates never match.
    pub fn matches(&self, other: &Point, resolution: f64) -> bool {
        (self.vx - other.vx).abs() <= resolution
            && (self.vy - other.vy).abs() <= resolution
            && (self.vz - other.vz).abs() <= resolution
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.vx, self.vy, self.vz]
    }
}

/// Ordered list of sample points sharing one matching resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointList {
    points: Vec<Point>,
    resolution: f64,
}

impl PointList {
    /// Build a list from coordinate arrays with the default resolution.
    pub fn new(vx: Vec<f64>, vy: Vec<f64>, vz: Vec<f64>) -> FieldResult<Self> {
        Self::with_resolution(vx, vy, vz, DEFAULT_POINT_RESOLUTION)
    }

    /// Build a list from coordinate arrays with an explicit resolution.
    pub fn with_resolution(
        vx: Vec<f64>,
        vy: Vec<f64>,
        vz: Vec<f64>,
        resolution: f64,
    ) -> FieldResult<Self> {
        if vy.len() != vx.len() {
            return Err(FieldError::shape_mismatch("vy", vx.len(), vy.len()));
        }
        if vz.len() != vx.len() {
            return Err(FieldError::shape_mismatch("vz", vx.len(), vz.len()));
        }
        let points = vx
            .into_iter()
            .zip(vy)
            .zip(vz)
            .map(|((x, y), z)| Point::new(x, y, z))
            .collect();
        Ok(PointList { points, resolution })
    }

    pub fn from_points(points: Vec<Point>, resolution: f64) -> Self {
        PointList { points, resolution }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn vx(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.vx).collect()
    }

    pub fn vy(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.vy).collect()
    }

    pub fn vz(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.vz).collect()
    }

    /// Coordinates as an (n, 3) array
    pub fn coordinates(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(Point::as_array).collect()
    }

    /// Index of the first point matching `point`, if any.
    pub fn index_of(&self, point: &Point) -> Option<usize> {
        self.points
            .iter()
            .position(|p| p.matches(point, self.resolution))
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.index_of(point).is_some()
    }

    /// Pairs `(i, j)` where point `i` of `self` matches point `j` of `other`.
    ///
    /// Pairs follow the order of `self`; `j` is the first match in `other`.
    pub fn matching_indices(&self, other: &PointList) -> Vec<(usize, usize)> {
        self.points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| other.index_of_with(p, self.resolution).map(|j| (i, j)))
            .collect()
    }

    /// Points of `self` also present in `other`, in the order of `self`.
    pub fn intersection(&self, other: &PointList) -> PointList {
        let points = self
            .matching_indices(other)
            .into_iter()
            .map(|(i, _)| self.points[i])
            .collect();
        PointList::from_points(points, self.resolution)
    }

    /// Points of `self` absent from `other`, in the order of `self`.
    pub fn difference(&self, other: &PointList) -> PointList {
        let points = self
            .points
            .iter()
            .filter(|p| other.index_of_with(p, self.resolution).is_none())
            .copied()
            .collect();
        PointList::from_points(points, self.resolution)
    }

    /// `self` followed by `other`, duplicates kept.
    pub fn aggregate(&self, other: &PointList) -> PointList {
        let mut points = Vec::with_capacity(self.len() + other.len());
        points.extend_from_slice(&self.points);
        points.extend_from_slice(&other.points);
        PointList::from_points(points, self.resolution)
    }

    /// Sub-list at `indices`, in the given order.
    pub fn extract(&self, indices: &[usize]) -> FieldResult<PointList> {
        let points = indices
            .iter()
            .map(|&i| {
                self.points.get(i).copied().ok_or(FieldError::IndexOutOfRange {
                    index: i,
                    len: self.len(),
                })
            })
            .collect::<FieldResult<Vec<_>>>()?;
        Ok(PointList::from_points(points, self.resolution))
    }

    /// Group indices of matching points. Groups come in order of first
    /// discovery and each group lists its members in list order.
    pub fn distinct_groups(&self) -> Vec<Vec<usize>> {
        let mut representatives: Vec<Point> = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (i, p) in self.points.iter().enumerate() {
            match representatives
                .iter()
                .position(|r| r.matches(p, self.resolution))
            {
                Some(g) => groups[g].push(i),
                None => {
                    representatives.push(*p);
                    groups.push(vec![i]);
                }
            }
        }
        groups
    }

    /// First point of every group of matching points.
    pub fn distinct(&self) -> PointList {
        let points = self
            .distinct_groups()
            .into_iter()
            .map(|group| self.points[group[0]])
            .collect();
        PointList::from_points(points, self.resolution)
    }

    /// True when no two points of the list match.
    pub fn is_unique(&self) -> bool {
        self.distinct_groups().len() == self.len()
    }

    /// Copy sorted by (vx, vy, vz), for order-independent comparison.
    pub fn sorted(&self) -> PointList {
        let mut points = self.points.clone();
        points.sort_by(|a, b| {
            a.vx.total_cmp(&b.vx)
                .then(a.vy.total_cmp(&b.vy))
                .then(a.vz.total_cmp(&b.vz))
        });
        PointList::from_points(points, self.resolution)
    }

    /// Same points regardless of order, within resolution.
    pub fn is_equal_within_resolution(&self, other: &PointList) -> bool {
        if self.len() != other.len() {
            return false;
        }
        let (a, b) = (self.sorted(), other.sorted());
        a.points
            .iter()
            .zip(b.points.iter())
            .all(|(p, q)| p.matches(q, self.resolution))
    }

    fn index_of_with(&self, point: &Point, resolution: f64) -> Option<usize> {
        self.points.iter().position(|p| p.matches(point, resolution))
    }
}
