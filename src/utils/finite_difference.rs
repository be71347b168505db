//! Finite difference methods for numerical differentiation.
//!
//! This module provides the point/parameter derivative used by the objective
//! and the covariance propagation, plus the residual Jacobian and the
//! chi-square Hessian used by the minimizer.

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{FitError, Result};

/// Relative step for point and parameter derivatives.
const RELATIVE_STEP: f64 = 1e-3;

/// Absolute floor on the step for values at or near zero.
const MIN_STEP: f64 = 1e-4;

/// A point in the model's input space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// What a derivative is taken with respect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Parameter(usize),
}

/// Step size for differentiating at `value`.
///
/// `h = 1e-3 * |value|`, never smaller than `1e-4`.
pub fn step_size(value: f64) -> f64 {
    (RELATIVE_STEP * value.abs()).max(MIN_STEP)
}

/// First derivative of `f(point, params)` along `axis`.
///
/// Uses the centered five-point stencil
/// `f' = (f(v-2h) - 8 f(v-h) + 8 f(v+h) - f(v+2h)) / 12h`,
/// with the step from [`step_size`]. Errors from `f` are propagated.
pub fn derivative<F>(f: F, point: Point, params: ArrayView1<f64>, axis: Axis) -> Result<f64>
where
    F: Fn(Point, ArrayView1<f64>) -> Result<f64>,
{
    let value = match axis {
        Axis::X => point.x,
        Axis::Y => point.y,
        Axis::Parameter(k) => *params.get(k).ok_or_else(|| {
            FitError::DimensionMismatch(format!(
                "parameter index {} out of range for {} parameters",
                k,
                params.len()
            ))
        })?,
    };
    let h = step_size(value);

    let mut shifted_params = params.to_owned();
    let mut eval_at = |offset: f64| -> Result<f64> {
        let v = value + offset;
        match axis {
            Axis::X => f(Point { x: v, ..point }, params),
            Axis::Y => f(Point { y: v, ..point }, params),
            Axis::Parameter(k) => {
                shifted_params[k] = v;
                f(point, shifted_params.view())
            }
        }
    };

    let fm2 = eval_at(-2.0 * h)?;
    let fm1 = eval_at(-h)?;
    let fp1 = eval_at(h)?;
    let fp2 = eval_at(2.0 * h)?;

    Ok((fm2 - 8.0 * fm1 + 8.0 * fp1 - fp2) / (12.0 * h))
}

/// Jacobian of a residual vector with respect to the parameters.
///
/// Each column uses the step `h_j = scale * steps[j]`. The difference is
/// central when both `p_j ± h_j` stay inside `[lower_j, upper_j]` and
/// one-sided (pointing into the box) otherwise.
///
/// Returns the Jacobian and the number of residual evaluations made.
pub fn jacobian<F>(
    residuals: F,
    params: &Array1<f64>,
    steps: &Array1<f64>,
    lower: &Array1<f64>,
    upper: &Array1<f64>,
    scale: f64,
) -> Result<(Array2<f64>, usize)>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    let n_params = params.len();
    let base = residuals(params)?;
    let mut evals = 1;
    let mut jac = Array2::zeros((base.len(), n_params));

    for j in 0..n_params {
        let h = (scale * steps[j]).max(f64::EPSILON * params[j].abs().max(1.0));
        let mut perturbed = params.clone();

        let column = if params[j] + h <= upper[j] && params[j] - h >= lower[j] {
            perturbed[j] = params[j] + h;
            let forward = residuals(&perturbed)?;
            perturbed[j] = params[j] - h;
            let backward = residuals(&perturbed)?;
            evals += 2;
            (forward - backward) / (2.0 * h)
        } else {
            // Step away from whichever limit is closer
            let h = if upper[j] - params[j] >= params[j] - lower[j] {
                h
            } else {
                -h
            };
            perturbed[j] = params[j] + h;
            let shifted = residuals(&perturbed)?;
            evals += 1;
            (shifted - &base) / h
        };

        if column.len() != base.len() {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                base.len(),
                column.len()
            )));
        }
        jac.column_mut(j).assign(&column);
    }

    Ok((jac, evals))
}

/// Hessian of a scalar function by central differences.
///
/// `steps[j]` is the difference step for parameter `j`.
/// Returns the Hessian and the number of function evaluations made.
pub fn hessian<F>(f: F, params: &Array1<f64>, steps: &Array1<f64>) -> Result<(Array2<f64>, usize)>
where
    F: Fn(&Array1<f64>) -> Result<f64>,
{
    let n = params.len();
    let mut hess = Array2::zeros((n, n));
    let f0 = f(params)?;
    let mut evals = 1;

    for i in 0..n {
        let hi = steps[i];

        let mut p = params.clone();
        p[i] = params[i] + hi;
        let f_plus = f(&p)?;
        p[i] = params[i] - hi;
        let f_minus = f(&p)?;
        evals += 2;
        hess[[i, i]] = (f_plus - 2.0 * f0 + f_minus) / (hi * hi);

        for j in 0..i {
            let hj = steps[j];
            let corner = |si: f64, sj: f64| -> Result<f64> {
                let mut p = params.clone();
                p[i] += si * hi;
                p[j] += sj * hj;
                f(&p)
            };
            let fpp = corner(1.0, 1.0)?;
            let fpm = corner(1.0, -1.0)?;
            let fmp = corner(-1.0, 1.0)?;
            let fmm = corner(-1.0, -1.0)?;
            evals += 4;

            let value = (fpp - fpm - fmp + fmm) / (4.0 * hi * hj);
            hess[[i, j]] = value;
            hess[[j, i]] = value;
        }
    }

    Ok((hess, evals))
}
