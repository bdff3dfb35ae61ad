//! # Reduction Settings
//!
//! Tolerances and policies shared by every step of the reduction. All fields
//! have serde defaults, so a JSON document only needs the keys it overrides.
//!
//! ## Example
//!
//! ```rust
//! use stress_core::settings::FieldSettings;
//!
//! let settings: FieldSettings = serde_json::from_str(r#"{ "max_chi2": 50.0 }"#).unwrap();
//! assert_eq!(settings.point_resolution, 1e-3);
//! assert_eq!(settings.max_chi2, Some(50.0));
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{FieldError, FieldResult};
use crate::field::FuseCriterion;
use crate::point_list::DEFAULT_POINT_RESOLUTION;

/// Default relative tolerance when comparing reference spacings
pub const DEFAULT_REFERENCE_RTOL: f64 = 1e-7;

/// Global reduction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// Absolute per-axis tolerance for two sample points to be the same point
    pub point_resolution: f64,

    /// Relative tolerance for reference spacings to agree across directions
    pub reference_rtol: f64,

    /// Absolute tolerance for reference spacings to agree across directions
    pub reference_atol: f64,

    /// How duplicate points of a stitched strain are resolved before stress evaluation
    pub fuse_criterion: FuseCriterion,

    /// Sub-runs whose fit cost exceeds this value are masked with NaN
    pub max_chi2: Option<f64>,
}

impl Default for FieldSettings {
    fn default() -> Self {
        FieldSettings {
            point_resolution: DEFAULT_POINT_RESOLUTION,
            reference_rtol: DEFAULT_REFERENCE_RTOL,
            reference_atol: 0.0,
            fuse_criterion: FuseCriterion::MinError,
            max_chi2: None,
        }
    }
}

impl FieldSettings {
    /// Validate the settings.
    pub fn validate(&self) -> FieldResult<()> {
        if !(self.point_resolution > 0.0) {
            return Err(FieldError::invalid_input(
                "point_resolution",
                self.point_resolution.to_string(),
                "Resolution must be positive",
            ));
        }
        if self.reference_rtol < 0.0 || self.reference_atol < 0.0 {
            return Err(FieldError::invalid_input(
                "reference_rtol",
                format!("{} / {}", self.reference_rtol, self.reference_atol),
                "Tolerances cannot be negative",
            ));
        }
        if let Some(max_chi2) = self.max_chi2 {
            if !(max_chi2 > 0.0) {
                return Err(FieldError::invalid_input(
                    "max_chi2",
                    max_chi2.to_string(),
                    "Fit cost cut must be positive",
                ));
            }
        }
        Ok(())
    }

    /// Check whether two reference spacings agree, `|a - b| <= atol + rtol * |b|`.
    pub fn references_agree(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.reference_atol + self.reference_rtol * b.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = FieldSettings::default();
        assert_eq!(settings.point_resolution, 1e-3);
        assert_eq!(settings.fuse_criterion, FuseCriterion::MinError);
        assert!(settings.max_chi2.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let settings: FieldSettings =
            serde_json::from_str(r#"{ "fuse_criterion": "average" }"#).unwrap();
        assert_eq!(settings.fuse_criterion, FuseCriterion::Average);
        assert_eq!(settings.reference_rtol, DEFAULT_REFERENCE_RTOL);
    }

    #[test]
    fn test_invalid_resolution() {
        let settings = FieldSettings {
            point_resolution: 0.0,
            ..FieldSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_references_agree() {
        let settings = FieldSettings::default();
        assert!(settings.references_agree(1.2, 1.2));
        assert!(settings.references_agree(1.2, 1.2 + 1e-9));
        assert!(!settings.references_agree(1.2, 1.21));
    }
}
