//! Termination states of the minimizer.

use serde::{Deserialize, Serialize};

/// Possible termination states for a minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The estimated distance to minimum fell below the threshold.
    Converged,

    /// The call budget ran out first.
    CallLimitReached,

    /// No step reduces the objective, even at maximum damping.
    NoProgress,

    /// The normal equations could not be solved at any damping.
    NumericalError,
}

impl ConvergenceStatus {
    /// Returns true if the minimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceStatus::Converged)
    }

    /// Minuit-style error flag: `0` converged, `4` abnormal termination.
    pub fn error_flag(&self) -> i32 {
        match self {
            ConvergenceStatus::Converged => 0,
            _ => 4,
        }
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Converged => "Converged: EDM below tolerance",
            ConvergenceStatus::CallLimitReached => "Terminated: call limit reached",
            ConvergenceStatus::NoProgress => "Terminated: no further progress possible",
            ConvergenceStatus::NumericalError => "Terminated: numerical error",
        }
    }
}

/// Estimated distance to minimum for a least-squares objective.
///
/// With gradient `g = 2 Jᵗ r` and Gauss-Newton Hessian `H = 2 JᵗJ`,
/// `EDM = ½ gᵗ H⁻¹ g = rᵗ J (JᵗJ)⁻¹ Jᵗ r`. `jtr` is `Jᵗ r` and `step` solves
/// `(JᵗJ) step = Jᵗ r`, so the EDM is their dot product.
pub fn edm(jtr: &[f64], step: &[f64]) -> f64 {
    jtr.iter().zip(step).map(|(a, b)| a * b).sum::<f64>().abs()
}
