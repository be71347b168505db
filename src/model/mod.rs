//! Model definitions.
//!
//! A model is data, not code: a [`Formula`], its parameter vectors (initial
//! values, limits and step sizes) and the datasets it is fit to, each with the
//! [`Recipe`] that prepares its response.

pub mod expression;
pub mod formula;

use std::fmt;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};
use crate::utils::finite_difference::{self, Axis, Point};
pub use formula::Formula;

/// Number of independent variables a model formula uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    /// `z = f(x; p)`
    OneArgument,
    /// `z = f(x, y; p)`
    TwoArgument,
}

/// Reference to a model by its catalog type and id, e.g. `NRQY` / `3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub model_type: String,
    pub model_id: u32,
}

impl ModelKey {
    pub fn new(model_type: impl Into<String>, model_id: u32) -> Self {
        Self {
            model_type: model_type.into(),
            model_id,
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.model_type, self.model_id)
    }
}

/// How a dataset's response is prepared before fitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipe {
    /// Use the raw response.
    Identity,
    /// Replace the response with `M(x, y; p̂) - z` for a previously fit model `M`.
    Chained(ModelKey),
}

impl Recipe {
    /// Parse a catalog recipe tag: `None`/`Identity`, or `<Type><Id>` such as `NRQY0`.
    pub fn parse(tag: &str) -> Result<Self> {
        let tag = tag.trim();
        if tag.eq_ignore_ascii_case("none") || tag.eq_ignore_ascii_case("identity") {
            return Ok(Recipe::Identity);
        }

        let split = tag
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i);

        match split {
            Some(i) if i > 0 => {
                let model_id = tag[i..]
                    .parse::<u32>()
                    .map_err(|e| FitError::InvalidDefinition {
                        model: tag.to_string(),
                        message: format!("bad recipe id: {}", e),
                    })?;
                Ok(Recipe::Chained(ModelKey::new(&tag[..i], model_id)))
            }
            _ => Err(FitError::InvalidDefinition {
                model: tag.to_string(),
                message: "recipe must be None, Identity or <Type><Id>".to_string(),
            }),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Recipe::Identity)
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipe::Identity => write!(f, "Identity"),
            Recipe::Chained(key) => write!(f, "{}", key),
        }
    }
}

/// A dataset listed by a model definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    /// File name relative to the data directory.
    pub name: String,
    pub recipe: Recipe,
}

/// A complete, validated model definition.
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    pub key: ModelKey,
    pub formula: Formula,
    pub initial: Array1<f64>,
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
    pub steps: Array1<f64>,
    pub datasets: Vec<DatasetSpec>,
}

impl ModelDefinition {
    /// Build a definition and check that it is internally consistent.
    ///
    /// Parameter vectors must have equal length, initial values must lie
    /// within their limits, step sizes must be positive, and the formula may
    /// not reference a parameter beyond the vector length.
    ///
    /// Limits of `0, 0` follow the Minuit convention and leave the parameter
    /// unbounded.
    pub fn new(
        key: ModelKey,
        formula: Formula,
        initial: Array1<f64>,
        mut lower: Array1<f64>,
        mut upper: Array1<f64>,
        steps: Array1<f64>,
        datasets: Vec<DatasetSpec>,
    ) -> Result<Self> {
        let invalid = |message: String| FitError::InvalidDefinition {
            model: key.to_string(),
            message,
        };

        let p = initial.len();
        if p == 0 {
            return Err(invalid("no parameters".to_string()));
        }
        if lower.len() != p || upper.len() != p || steps.len() != p {
            return Err(invalid(format!(
                "parameter vectors differ in length (P = {}, LL = {}, LH = {}, S = {})",
                p,
                lower.len(),
                upper.len(),
                steps.len()
            )));
        }
        for k in 0..p {
            if lower[k] == 0.0 && upper[k] == 0.0 {
                lower[k] = f64::NEG_INFINITY;
                upper[k] = f64::INFINITY;
            }
            if !(lower[k] <= initial[k] && initial[k] <= upper[k]) {
                return Err(invalid(format!(
                    "parameter [{}] = {} lies outside its limits [{}, {}]",
                    k, initial[k], lower[k], upper[k]
                )));
            }
            if !(steps[k] > 0.0) {
                return Err(invalid(format!(
                    "step size for parameter [{}] must be positive, got {}",
                    k, steps[k]
                )));
            }
        }
        if formula.parameter_span() > p {
            return Err(invalid(format!(
                "formula references parameter [{}] but only {} are defined",
                formula.parameter_span() - 1,
                p
            )));
        }

        Ok(Self {
            key,
            formula,
            initial,
            lower,
            upper,
            steps,
            datasets,
        })
    }

    pub fn arity(&self) -> Arity {
        self.formula.arity()
    }

    pub fn parameter_count(&self) -> usize {
        self.initial.len()
    }

    /// Whether any listed dataset is corrected through another model.
    pub fn has_chained_datasets(&self) -> bool {
        self.datasets.iter().any(|d| !d.recipe.is_identity())
    }

    /// Evaluate the model at one point.
    pub fn evaluate(&self, x: f64, y: f64, params: ArrayView1<f64>) -> Result<f64> {
        self.formula.evaluate(x, y, params)
    }

    /// Numeric derivative of the model at `point` along `axis`.
    pub fn derivative(&self, point: Point, params: ArrayView1<f64>, axis: Axis) -> Result<f64> {
        finite_difference::derivative(
            |pt, q| self.formula.evaluate(pt.x, pt.y, q),
            point,
            params,
            axis,
        )
    }
}
