//! # Covariance Matrix Calculations
//!
//! Parameter covariance at the minimum of a chi-square, either from the
//! Jacobian of the whitened residuals (Gauss-Newton) or from a
//! finite-difference Hessian of the chi-square itself.

use nalgebra::Cholesky;
use ndarray::{Array1, Array2};

use crate::error::{FitError, Result};
use crate::lm::Bounds;
use crate::problem::Problem;
use crate::utils::finite_difference::{self, step_size};
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};

/// Parameter covariance `UP · (JᵗJ)⁻¹` from the residual Jacobian.
///
/// The Gauss-Newton Hessian of `χ² = |r|²` is `2 JᵗJ`, and the covariance is
/// `2 · UP · H⁻¹`, so the factors of two cancel.
pub fn parameter_covariance(jacobian: &Array2<f64>, up: f64) -> Result<Array2<f64>> {
    let jtj = jacobian.t().dot(jacobian);
    Ok(invert_spd(&jtj, "JᵗJ")? * up)
}

/// Parameter covariance `2 · UP · H⁻¹` from the Hessian of the objective.
pub fn hessian_covariance(hessian: &Array2<f64>, up: f64) -> Result<Array2<f64>> {
    Ok(invert_spd(hessian, "Hessian")? * (2.0 * up))
}

/// Hesse refinement: finite-difference Hessian of the chi-square near `params`.
///
/// Steps follow the relative policy of the differentiation utility, capped
/// at half the width of a two-sided box. A parameter closer to a limit than
/// its step has its stencil centered one step inside the box, so every
/// evaluation stays within the limits. Returns the covariance and the number
/// of objective evaluations spent.
pub fn hesse<P: Problem>(
    problem: &P,
    params: &Array1<f64>,
    bounds: &[Bounds],
    up: f64,
) -> Result<(Array2<f64>, usize)> {
    let n = params.len();
    let mut center = params.clone();
    let mut steps = Array1::zeros(n);
    for (k, (&p, b)) in params.iter().zip(bounds).enumerate() {
        if b.is_fixed() {
            return Err(FitError::SingularCovariance(format!(
                "parameter {} is fixed by its limits",
                k
            )));
        }
        let h = step_size(p).min((b.max - b.min) / 2.0);
        center[k] = if p - h < b.min {
            b.min + h
        } else if p + h > b.max {
            b.max - h
        } else {
            p
        };
        steps[k] = h;
    }

    let (hessian, evals) = finite_difference::hessian(|p| problem.eval_cost(p), &center, &steps)?;
    log::debug!("Hesse used {} evaluations", evals);
    Ok((hessian_covariance(&hessian, up)?, evals))
}

fn invert_spd(matrix: &Array2<f64>, what: &str) -> Result<Array2<f64>> {
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SingularCovariance(format!("{} has non-finite entries", what)));
    }
    let chol = Cholesky::new(ndarray_to_nalgebra(matrix)).ok_or_else(|| {
        FitError::SingularCovariance(format!("{} is not positive definite", what))
    })?;
    let inverse = nalgebra_to_ndarray(&chol.inverse());
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SingularCovariance(format!("{} is singular", what)));
    }
    Ok(inverse)
}

/// Calculate correlation matrix from covariance matrix.
///
/// The correlation matrix is calculated as:
///   correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])
///
/// Diagonal elements are 1.0; pairs involving a zero variance are 0.0.
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    let mut correl = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..n {
            if i == j {
                correl[[i, j]] = 1.0;
            } else {
                let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
                if denom > 0.0 {
                    correl[[i, j]] = covar[[i, j]] / denom;
                }
            }
        }
    }

    correl
}

/// Extract standard errors from the covariance matrix.
///
/// Standard errors are the square roots of the diagonal elements
/// of the covariance matrix.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar.diag().mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}
