//! Chi-square objective.
//!
//! [`Objective`] borrows everything it needs (model, measurements and, for
//! generalized least squares, the covariance factors) and is otherwise
//! stateless: evaluating it never mutates shared data.
//!
//! Two weightings are supported:
//!
//! - **Diagonal**: `χ² = Σ (z_i - m_i)² / σ_i²` with
//!   `σ_i² = σ_z² + (δx · ∂m/∂x)² [+ (δy · ∂m/∂y)²]`, where `σ_z` is the response
//!   error on the side the model lies and `δx`, `δy` are mean error bars.
//! - **Generalized**: `χ² = rᵗ V⁻¹ r` with `r_i = z_i - m_i`.

use ndarray::{Array1, ArrayView1};

use crate::covariance::CovarianceFactors;
use crate::data::Measurement;
use crate::error::{FitError, Result};
use crate::model::{Arity, ModelDefinition};
use crate::problem::Problem;
use crate::utils::finite_difference::{Axis, Point};

/// How residuals are weighted.
#[derive(Debug, Clone, Copy)]
pub enum Weighting<'a> {
    /// Independent points with effective variances.
    Diagonal,
    /// Correlated points with a full covariance.
    Generalized(&'a CovarianceFactors),
}

/// Read-only context for evaluating the chi-square of one fit.
#[derive(Debug, Clone, Copy)]
pub struct Objective<'a> {
    model: &'a ModelDefinition,
    measurements: &'a [Measurement],
    weighting: Weighting<'a>,
}

impl<'a> Objective<'a> {
    pub fn new(
        model: &'a ModelDefinition,
        measurements: &'a [Measurement],
        weighting: Weighting<'a>,
    ) -> Result<Self> {
        if let Weighting::Generalized(factors) = weighting {
            if factors.dim() != measurements.len() {
                return Err(FitError::DimensionMismatch(format!(
                    "{} measurements but a {}x{} covariance",
                    measurements.len(),
                    factors.dim(),
                    factors.dim()
                )));
            }
        }
        Ok(Self {
            model,
            measurements,
            weighting,
        })
    }

    pub fn model(&self) -> &ModelDefinition {
        self.model
    }

    pub fn measurements(&self) -> &[Measurement] {
        self.measurements
    }

    pub fn is_generalized(&self) -> bool {
        matches!(self.weighting, Weighting::Generalized(_))
    }

    /// Raw residuals `z_i - m_i`.
    pub fn residuals(&self, params: ArrayView1<f64>) -> Result<Array1<f64>> {
        let mut r = Array1::zeros(self.measurements.len());
        for (slot, m) in r.iter_mut().zip(self.measurements) {
            *slot = m.z - self.model.evaluate(m.x, m.y, params)?;
        }
        Ok(r)
    }

    /// Effective variance of point `m` for the diagonal weighting.
    fn effective_variance(&self, m: &Measurement, residual: f64, params: ArrayView1<f64>) -> Result<f64> {
        let point = Point::new(m.x, m.y);
        let sigma_z = m.z_err_toward(residual);
        let dmdx = self.model.derivative(point, params, Axis::X)?;
        let mut variance = sigma_z.powi(2) + (m.mean_x_err() * dmdx).powi(2);
        if self.model.arity() == Arity::TwoArgument {
            let dmdy = self.model.derivative(point, params, Axis::Y)?;
            variance += (m.mean_y_err() * dmdy).powi(2);
        }
        Ok(variance)
    }

    /// Independent residuals whose squared norm is the chi-square.
    pub fn whitened_residuals(&self, params: ArrayView1<f64>) -> Result<Array1<f64>> {
        let r = self.residuals(params)?;
        match self.weighting {
            Weighting::Generalized(factors) => factors.whiten(&r),
            Weighting::Diagonal => {
                let mut w = Array1::zeros(r.len());
                for (i, m) in self.measurements.iter().enumerate() {
                    let variance = self.effective_variance(m, r[i], params)?;
                    if !(variance > 0.0) || !variance.is_finite() {
                        return Err(FitError::FunctionEvaluation(format!(
                            "point {} (x = {}, y = {}) has effective variance {}",
                            i, m.x, m.y, variance
                        )));
                    }
                    w[i] = r[i] / variance.sqrt();
                }
                Ok(w)
            }
        }
    }

    /// `χ²` at `params`.
    pub fn chi_square(&self, params: ArrayView1<f64>) -> Result<f64> {
        Ok(self.whitened_residuals(params)?.mapv(|w| w * w).sum())
    }
}

impl Problem for Objective<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        if params.len() != self.model.parameter_count() {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                self.model.parameter_count(),
                params.len()
            )));
        }
        self.whitened_residuals(params.view())
    }

    fn parameter_count(&self) -> usize {
        self.model.parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.measurements.len()
    }
}
