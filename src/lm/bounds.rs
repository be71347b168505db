//! Parameter bounds implementation
//!
//! This module implements the Minuit-style parameter transformation used to
//! enforce box limits during minimization. The minimizer steps in unbounded
//! internal coordinates; the objective only ever sees external values, which
//! are inside the limits by construction.

use std::f64::{INFINITY, NEG_INFINITY};

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must be less than max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Parameter value {value} is outside bounds: [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Infinite parameter value is not allowed")]
    InfiniteValue,
}

/// Represents the bounds constraints on a parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create a new bounds constraint, `min <= max`
    ///
    /// # Examples
    ///
    /// ```
    /// use chainfit_rs::lm::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert_eq!(bounds.max, 10.0);
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min > max || min.is_nan() || max.is_nan() {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Create an unbounded constraint (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build one `Bounds` per parameter from limit vectors.
    pub fn from_limits(
        lower: &Array1<f64>,
        upper: &Array1<f64>,
    ) -> Result<Vec<Self>, BoundsError> {
        lower
            .iter()
            .zip(upper.iter())
            .map(|(&min, &max)| Self::new(min, max))
            .collect()
    }

    /// Check if a value is within the bounds
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    /// A parameter whose limits coincide cannot move.
    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Implements the Minuit-style parameter transformations for handling bounds constraints
///
/// | limits      | external from internal `u`            |
/// |-------------|---------------------------------------|
/// | none        | `u`                                   |
/// | lower only  | `min - 1 + sqrt(u² + 1)`              |
/// | upper only  | `max + 1 - sqrt(u² + 1)`              |
/// | both        | `min + (sin u + 1) (max - min) / 2`   |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsTransform {
    bounds: Bounds,
}

impl BoundsTransform {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Transform an internal parameter value to an external value
    pub fn to_external(&self, internal_value: f64) -> f64 {
        let b = &self.bounds;
        match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => internal_value,
            (true, false) => b.min - 1.0 + (internal_value * internal_value + 1.0).sqrt(),
            (false, true) => b.max + 1.0 - (internal_value * internal_value + 1.0).sqrt(),
            // Rounding in sin() may step a hair outside the box
            (true, true) => b.clamp(b.min + (internal_value.sin() + 1.0) * (b.max - b.min) / 2.0),
        }
    }

    /// Transform an external parameter value to an internal value
    ///
    /// Fails if the value is not finite or lies outside the bounds.
    pub fn to_internal(&self, external_value: f64) -> Result<f64, BoundsError> {
        if !external_value.is_finite() {
            return Err(BoundsError::InfiniteValue);
        }

        let b = &self.bounds;
        if !b.is_within_bounds(external_value) {
            return Err(BoundsError::ValueOutsideBounds {
                value: external_value,
                min: b.min,
                max: b.max,
            });
        }

        Ok(match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => external_value,
            (true, false) => ((external_value - b.min + 1.0).powi(2) - 1.0).sqrt(),
            (false, true) => ((b.max - external_value + 1.0).powi(2) - 1.0).sqrt(),
            (true, true) => {
                if b.is_fixed() {
                    return Ok(0.0);
                }
                let scaled = 2.0 * (external_value - b.min) / (b.max - b.min) - 1.0;
                scaled.clamp(-1.0, 1.0).asin()
            }
        })
    }

    /// `d(external)/d(internal)` at the given internal value.
    pub fn derivative(&self, internal_value: f64) -> f64 {
        let b = &self.bounds;
        match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => 1.0,
            (true, false) => internal_value / (internal_value * internal_value + 1.0).sqrt(),
            (false, true) => -internal_value / (internal_value * internal_value + 1.0).sqrt(),
            (true, true) => (b.max - b.min) * internal_value.cos() / 2.0,
        }
    }

    /// `d²(external)/d(internal)²` at the given internal value.
    pub fn second_derivative(&self, internal_value: f64) -> f64 {
        let b = &self.bounds;
        let cube = || (internal_value * internal_value + 1.0).powf(1.5);
        match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => 0.0,
            (true, false) => 1.0 / cube(),
            (false, true) => -1.0 / cube(),
            (true, true) => -(b.max - b.min) * internal_value.sin() / 2.0,
        }
    }
}
