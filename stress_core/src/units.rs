//! # Unit Types
//!
//! Angle wrappers for peak positions. Peaks are fitted in degrees two-theta
//! ([`Degrees`]) and converted to [`Radians`] for trigonometry. These are just
//! f64 newtypes so JSON stays plain numbers.
//!
//! ## Example
//!
//! ```rust
//! use stress_core::units::{Degrees, Radians};
//!
//! let two_theta = Degrees(180.0);
//! let rad: Radians = two_theta.into();
//! assert!((rad.0 - std::f64::consts::PI).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Sub};

// ============================================================================
// Angle Units
// ============================================================================

/// Angle in degrees
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Degrees(pub f64);

/// Angle in radians
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Radians(pub f64);

impl From<Degrees> for Radians {
    fn from(deg: Degrees) -> Self {
        Radians(deg.0.to_radians())
    }
}

impl From<Radians> for Degrees {
    fn from(rad: Radians) -> Self {
        Degrees(rad.0.to_degrees())
    }
}

// ============================================================================
// Arithmetic Implementations
// ============================================================================

macro_rules! impl_arithmetic {
    ($type:ty) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl $type {
            /// Get the raw f64 value
            pub fn value(self) -> f64 {
                self.0
            }
        }
    };
}

impl_arithmetic!(Degrees);
impl_arithmetic!(Radians);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrees_to_radians() {
        let rad: Radians = Degrees(90.0).into();
        assert!((rad.0 - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        let back: Degrees = rad.into();
        assert!((back.0 - 90.0).abs() < 1e-12);
    }

    #[test]
    fn test_arithmetic() {
        let a = Degrees(2.0);
        let b = Degrees(0.5);
        assert_eq!((a + b).0, 2.5);
        assert_eq!((a - b).0, 1.5);
        assert_eq!((a * 2.0).0, 4.0);
        assert_eq!((a / 2.0).value(), 1.0);
    }

    #[test]
    fn test_serialization() {
        let deg = Degrees(91.5);
        let json = serde_json::to_string(&deg).unwrap();
        assert_eq!(json, "91.5");

        let roundtrip: Degrees = serde_json::from_str(&json).unwrap();
        assert_eq!(deg, roundtrip);
    }
}
