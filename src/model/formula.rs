//! Compiled model formulas.
//!
//! A [`Formula`] is the parsed form of a catalog `F` entry. It is compiled once
//! when the definition is loaded; its [`Arity`] is fixed at that point.

use ndarray::ArrayView1;

use super::expression::{EvaluationContext, Expression, ExpressionError};
use super::Arity;
use crate::error::{FitError, Result};

/// Point and parameter values a formula is evaluated against.
struct PointContext<'a> {
    x: f64,
    y: f64,
    params: ArrayView1<'a, f64>,
}

impl EvaluationContext for PointContext<'_> {
    fn get_variable(&self, name: &str) -> std::result::Result<f64, ExpressionError> {
        match name {
            "x" => Ok(self.x),
            "y" => Ok(self.y),
            _ => Err(ExpressionError::UndefinedVariable {
                name: name.to_string(),
            }),
        }
    }

    fn get_parameter(&self, index: usize) -> std::result::Result<f64, ExpressionError> {
        self.params
            .get(index)
            .copied()
            .ok_or(ExpressionError::ParameterOutOfRange {
                index,
                count: self.params.len(),
            })
    }
}

/// A parsed model formula `z = f(x, y; p)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    text: String,
    expr: Expression,
    arity: Arity,
}

impl Formula {
    /// Parse formula text.
    ///
    /// Only `x` and `y` are accepted as free variables. The arity is
    /// [`Arity::TwoArgument`] exactly when `y` appears.
    pub fn parse(text: &str) -> Result<Self> {
        let expr = Expression::parse(text)?;

        let mut arity = Arity::OneArgument;
        for name in expr.variables() {
            match name.as_str() {
                "x" => {}
                "y" => arity = Arity::TwoArgument,
                _ => return Err(ExpressionError::UndefinedVariable { name }.into()),
            }
        }

        Ok(Self {
            text: text.trim().to_string(),
            expr,
            arity,
        })
    }

    /// The formula as written in the catalog.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Number of parameter slots referenced (highest `[k]` plus one).
    pub fn parameter_span(&self) -> usize {
        self.expr.parameter_span()
    }

    /// Evaluate the formula at `(x, y)` with parameter vector `params`.
    ///
    /// `y` is ignored by one-argument formulas. A non-finite result is an error.
    pub fn evaluate(&self, x: f64, y: f64, params: ArrayView1<f64>) -> Result<f64> {
        let ctx = PointContext { x, y, params };
        let value = self.expr.evaluate(&ctx)?;
        if !value.is_finite() {
            return Err(FitError::FunctionEvaluation(format!(
                "{} is not finite at x = {}, y = {} (params {})",
                self.text, x, y, params
            )));
        }
        Ok(value)
    }
}
