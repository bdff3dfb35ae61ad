//! # Error Types
//!
//! Structured error types for stress_core. Every failure in the field algebra
//! is surfaced immediately to the caller; nothing is retried or coerced.
//!
//! ## Example
//!
//! ```rust
//! use stress_core::errors::{FieldError, FieldResult};
//!
//! fn check_lengths(values: &[f64], errors: &[f64]) -> FieldResult<()> {
//!     if values.len() != errors.len() {
//!         return Err(FieldError::shape_mismatch("errors", values.len(), errors.len()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_lengths(&[1.0], &[0.1, 0.2]).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for stress_core operations
pub type FieldResult<T> = Result<T, FieldError>;

/// Structured error type for field and stress operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum FieldError {
    /// Per-point arrays of one field do not share a common length
    #[error("Shape mismatch for '{field}': expected {expected} entries, found {actual}")]
    ShapeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// An index does not address a point of the field
    #[error("Index {index} out of range for field of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Two fields describe different physical quantities
    #[error("Cannot aggregate fields of different physical quantities: '{left}' and '{right}'")]
    QuantityMismatch { left: String, right: String },

    /// Reference spacings measured along different directions disagree
    #[error(
        "Reference spacings are different on different directions at ({vx}, {vy}, {vz}): {first} != {second}"
    )]
    InconsistentReference {
        vx: f64,
        vy: f64,
        vz: f64,
        first: f64,
        second: f64,
    },

    /// Strain or stress was requested before anything was selected
    #[error("No selection has been entered")]
    NoSelection,

    /// Stress was requested while a single run is selected
    #[error("Selection {selection} must specify one direction")]
    SelectionNotDirection { selection: String },

    /// Direction token is not one of '11', '22', '33'
    #[error("Unknown direction '{token}': expected one of '11', '22', '33'")]
    UnknownDirection { token: String },

    /// Run number is not known to any direction
    #[error("Unknown run number '{run}'")]
    UnknownRun { run: String },

    /// A stress type needs a strain that was not supplied
    #[error("Stress type {stress_type} requires a strain along direction {direction}")]
    MissingDirection {
        direction: String,
        stress_type: String,
    },

    /// An input value is invalid (out of range, non-physical, etc.)
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl FieldError {
    /// Create a ShapeMismatch error
    pub fn shape_mismatch(field: impl Into<String>, expected: usize, actual: usize) -> Self {
        FieldError::ShapeMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }

    /// Create a QuantityMismatch error
    pub fn quantity_mismatch(left: impl Into<String>, right: impl Into<String>) -> Self {
        FieldError::QuantityMismatch {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        FieldError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a MissingDirection error
    pub fn missing_direction(direction: impl Into<String>, stress_type: impl Into<String>) -> Self {
        FieldError::MissingDirection {
            direction: direction.into(),
            stress_type: stress_type.into(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        FieldError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error comes from misuse of the facade selection
    pub fn is_selection_error(&self) -> bool {
        matches!(
            self,
            FieldError::NoSelection
                | FieldError::SelectionNotDirection { .. }
                | FieldError::UnknownDirection { .. }
                | FieldError::UnknownRun { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            FieldError::ShapeMismatch { .. } => "SHAPE_MISMATCH",
            FieldError::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            FieldError::QuantityMismatch { .. } => "QUANTITY_MISMATCH",
            FieldError::InconsistentReference { .. } => "INCONSISTENT_REFERENCE",
            FieldError::NoSelection => "NO_SELECTION",
            FieldError::SelectionNotDirection { .. } => "SELECTION_NOT_DIRECTION",
            FieldError::UnknownDirection { .. } => "UNKNOWN_DIRECTION",
            FieldError::UnknownRun { .. } => "UNKNOWN_RUN",
            FieldError::MissingDirection { .. } => "MISSING_DIRECTION",
            FieldError::InvalidInput { .. } => "INVALID_INPUT",
            FieldError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
