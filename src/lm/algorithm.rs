//! Implementation of the bounded Levenberg-Marquardt minimizer.
//!
//! The minimizer works on the whitened residual vector of a [`Problem`].
//! Parameters are stepped in Minuit-style internal coordinates so that box
//! limits hold by construction; the Jacobian is taken by finite differences in
//! external coordinates and chained into internal ones. Iteration stops when
//! the estimated distance to minimum drops below the configured threshold, the
//! call budget runs out, or no damped step reduces the objective.

use std::fmt;

use nalgebra::{Cholesky, DMatrix, DVector};
use ndarray::{Array1, Array2};

use crate::error::{FitError, Result};
use crate::problem::Problem;
use crate::utils::finite_difference;
use crate::utils::matrix_convert::{ndarray_to_faer, ndarray_to_faer_transposed, ndarray_vec_to_faer};

use super::bounds::{Bounds, BoundsTransform};
use super::config::MinimizerConfig;
use super::convergence::{edm, ConvergenceStatus};

/// Result of a minimization.
#[derive(Debug, Clone)]
pub struct MinimizerResult {
    /// Parameter values at the end of the run (external coordinates)
    pub params: Array1<f64>,

    /// Whitened residuals at `params`
    pub residuals: Array1<f64>,

    /// Sum of squared whitened residuals (the chi-square)
    pub chi2: f64,

    /// Estimated distance to minimum at the last Jacobian evaluation
    pub edm: f64,

    /// Number of objective evaluations
    pub calls: usize,

    /// Number of accepted steps
    pub iterations: usize,

    /// How the run ended
    pub status: ConvergenceStatus,

    /// Jacobian of the residuals with respect to the external parameters
    pub jacobian: Array2<f64>,
}

impl MinimizerResult {
    /// Minuit-style error flag (`0` on convergence).
    pub fn error_flag(&self) -> i32 {
        self.status.error_flag()
    }

    pub fn success(&self) -> bool {
        self.status.is_converged()
    }
}

impl fmt::Display for MinimizerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Minimization Result:")?;
        writeln!(f, "  Status: {}", self.status.description())?;
        writeln!(f, "  Chi-square: {:.6e}", self.chi2)?;
        writeln!(f, "  EDM: {:.3e}", self.edm)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function calls: {}", self.calls)?;
        writeln!(f, "  Parameters: {}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt minimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: MinimizerConfig,
}

impl LevenbergMarquardt {
    /// Create a new minimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new minimizer with the given configuration.
    pub fn with_config(config: MinimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MinimizerConfig {
        &self.config
    }

    /// Set the maximum number of objective evaluations.
    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.config.max_calls = max_calls;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    /// Minimize the sum of squared residuals of `problem` within `bounds`.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to solve
    /// * `initial` - Starting parameter values, inside their bounds
    /// * `bounds` - Box limits, one per parameter
    /// * `steps` - Characteristic step size per parameter
    ///
    /// # Returns
    ///
    /// The end state of the run. Non-convergence is reported through
    /// [`MinimizerResult::status`]; `Err` is reserved for invalid input and
    /// for failures of the problem at the starting point.
    pub fn minimize<P: Problem>(
        &self,
        problem: &P,
        initial: &Array1<f64>,
        bounds: &[Bounds],
        steps: &Array1<f64>,
    ) -> Result<MinimizerResult> {
        let n_params = problem.parameter_count();
        if initial.len() != n_params || bounds.len() != n_params || steps.len() != n_params {
            return Err(FitError::DimensionMismatch(format!(
                "Expected {} parameters, got {} values, {} bounds and {} steps",
                n_params,
                initial.len(),
                bounds.len(),
                steps.len()
            )));
        }

        let transforms: Vec<BoundsTransform> =
            bounds.iter().copied().map(BoundsTransform::new).collect();
        let lower = Array1::from_iter(bounds.iter().map(|b| b.min));
        let upper = Array1::from_iter(bounds.iter().map(|b| b.max));
        let to_external = |u: &Array1<f64>| -> Array1<f64> {
            Array1::from_iter(u.iter().zip(&transforms).map(|(&v, t)| t.to_external(v)))
        };

        let mut internal = Array1::zeros(n_params);
        for (j, t) in transforms.iter().enumerate() {
            internal[j] = t.to_internal(initial[j])?;
        }
        let mut params = to_external(&internal);

        let mut residuals = problem.eval(&params)?;
        let mut calls = 1;
        let mut cost = sum_of_squares(&residuals);
        let mut lambda = self.config.initial_lambda;
        let mut iterations = 0;
        // Set by every Jacobian pass, which precedes every exit from the loop
        let mut edm_value: f64;
        let mut jacobian: Array2<f64>;
        let threshold = self.config.edm_threshold();

        log::debug!("minimizer start: chi2 = {:.6e}, params = {}", cost, params);

        let status = 'outer: loop {
            let (j_ext, evals) = finite_difference::jacobian(
                |p| problem.eval(p),
                &params,
                steps,
                &lower,
                &upper,
                self.config.derivative_scale,
            )?;
            calls += evals;

            // Chain rule: dr/du = dr/dp * dp/du
            let mut j_int = j_ext.clone();
            for (k, mut col) in j_int.columns_mut().into_iter().enumerate() {
                col *= transforms[k].derivative(internal[k]);
            }
            let (mut jtj, jtr) = normal_equations(&j_int, &residuals);

            // Transform curvature: near a limit dp/du -> 0 and JᵗJ alone degenerates
            let gradient = j_ext.t().dot(&residuals);
            for (k, t) in transforms.iter().enumerate() {
                jtj[(k, k)] += (gradient[k] * t.second_derivative(internal[k])).max(0.0);
            }
            jacobian = j_ext;

            edm_value = match solve_damped(&jtj, &jtr, 0.0) {
                Some(newton) => edm(jtr.as_slice(), newton.as_slice()),
                None => f64::INFINITY,
            };
            log::debug!(
                "iteration {}: chi2 = {:.6e}, edm = {:.3e}, lambda = {:.1e}, calls = {}",
                iterations,
                cost,
                edm_value,
                lambda,
                calls
            );

            if edm_value < threshold {
                break ConvergenceStatus::Converged;
            }
            if calls >= self.config.max_calls {
                break ConvergenceStatus::CallLimitReached;
            }

            // Damped step search
            loop {
                let step = match solve_damped(&jtj, &jtr, lambda) {
                    Some(step) => step,
                    None => {
                        lambda *= self.config.lambda_up_factor;
                        if lambda > self.config.max_lambda {
                            break 'outer ConvergenceStatus::NumericalError;
                        }
                        continue;
                    }
                };

                let trial_internal = &internal - &Array1::from_iter(step.iter().copied());
                let trial_params = to_external(&trial_internal);
                calls += 1;

                let accepted = match problem.eval(&trial_params) {
                    Ok(trial_residuals) => {
                        let trial_cost = sum_of_squares(&trial_residuals);
                        if trial_cost.is_finite() && trial_cost < cost {
                            internal = trial_internal;
                            params = trial_params;
                            residuals = trial_residuals;
                            cost = trial_cost;
                            true
                        } else {
                            false
                        }
                    }
                    // The model may be undefined away from the current point
                    Err(FitError::FunctionEvaluation(_)) | Err(FitError::Expression(_)) => false,
                    Err(e) => return Err(e),
                };

                if accepted {
                    lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);
                    iterations += 1;
                    break;
                }

                lambda *= self.config.lambda_up_factor;
                if lambda > self.config.max_lambda {
                    break 'outer ConvergenceStatus::NoProgress;
                }
                if calls >= self.config.max_calls {
                    break 'outer ConvergenceStatus::CallLimitReached;
                }
            }
        };

        log::debug!(
            "minimizer end: {} after {} calls, chi2 = {:.6e}, edm = {:.3e}",
            status.description(),
            calls,
            cost,
            edm_value
        );

        Ok(MinimizerResult {
            params,
            residuals,
            chi2: cost,
            edm: edm_value,
            calls,
            iterations,
            status,
            jacobian,
        })
    }
}

fn sum_of_squares(r: &Array1<f64>) -> f64 {
    r.iter().map(|v| v * v).sum()
}

/// `JᵗJ` and `Jᵗr`, formed with faer.
fn normal_equations(j: &Array2<f64>, r: &Array1<f64>) -> (DMatrix<f64>, DVector<f64>) {
    let n = j.ncols();
    let jt = ndarray_to_faer_transposed(j);
    let jm = ndarray_to_faer(j);
    let rm = ndarray_vec_to_faer(r);

    let jtj = &jt * &jm;
    let jtr = &jt * &rm;

    (
        DMatrix::from_fn(n, n, |a, b| jtj[(a, b)]),
        DVector::from_fn(n, |a, _| jtr[(a, 0)]),
    )
}

/// Solve `(JᵗJ + λ·diag(JᵗJ)) δ = Jᵗr` by Cholesky.
///
/// Zero diagonal entries (parameters the residuals do not depend on) are
/// lifted to a tiny floor so the system stays solvable; their step is zero.
fn solve_damped(jtj: &DMatrix<f64>, jtr: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let n = jtj.nrows();
    let max_diag = (0..n).map(|i| jtj[(i, i)]).fold(0.0, f64::max);
    let floor = if max_diag > 0.0 {
        max_diag * 1e-14
    } else {
        f64::MIN_POSITIVE
    };

    let mut a = jtj.clone();
    for i in 0..n {
        a[(i, i)] = jtj[(i, i)].max(floor) * (1.0 + lambda);
    }

    let step = Cholesky::new(a)?.solve(jtr);
    if step.iter().all(|v| v.is_finite()) {
        Some(step)
    } else {
        None
    }
}
