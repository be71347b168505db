//! Configuration options for the bounded Levenberg-Marquardt minimizer.
//!
//! The user-facing knobs mirror a Minuit session (`UP`, call budget,
//! tolerance, optional Hesse step); the damping schedule is internal.

use serde::{Deserialize, Serialize};

/// Configuration options for the minimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimizerConfig {
    /// Objective increase that defines one standard deviation. Default: 1.0 (chi-square)
    pub up: f64,

    /// Maximum number of objective evaluations. Default: 5000
    pub max_calls: usize,

    /// Convergence tolerance; the fit stops once `EDM < 1e-3 * tolerance * up`. Default: 0.1
    pub tolerance: f64,

    /// Recompute the parameter covariance from a finite-difference Hessian. Default: false
    pub hesse: bool,

    /// Jacobian step as a fraction of each parameter's step size. Default: 1e-3
    pub derivative_scale: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e10
    pub max_lambda: f64,
}

impl Default for MinimizerConfig {
    fn default() -> Self {
        Self {
            up: 1.0,
            max_calls: 5000,
            tolerance: 0.1,
            hesse: false,
            derivative_scale: 1e-3,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e10,
        }
    }
}

impl MinimizerConfig {
    /// EDM below which the minimum is accepted.
    pub fn edm_threshold(&self) -> f64 {
        1e-3 * self.tolerance * self.up
    }
}
