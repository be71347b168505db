//! Problem definition trait.
//!
//! This module defines the `Problem` trait, the seam between a least-squares
//! objective and the minimizer. The minimizer only ever sees a vector of
//! independent residuals whose squared norm is the chi-square.

use ndarray::Array1;

use crate::error::Result;

/// A trait representing a nonlinear least squares problem.
pub trait Problem {
    /// Evaluate the residuals at the given parameters.
    ///
    /// The residuals must be independent and unit-variance (already weighted
    /// or whitened), so that their squared norm is the chi-square.
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Get the number of parameters in the problem.
    fn parameter_count(&self) -> usize;

    /// Get the number of residuals in the problem.
    fn residual_count(&self) -> usize;

    /// Evaluate the sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Offset {
        target: Array1<f64>,
    }

    impl Problem for Offset {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            Ok(&self.target - params[0])
        }

        fn parameter_count(&self) -> usize {
            1
        }

        fn residual_count(&self) -> usize {
            self.target.len()
        }
    }

    #[test]
    fn test_default_cost() {
        let problem = Offset {
            target: array![1.0, 2.0, 3.0],
        };
        assert_eq!(problem.eval_cost(&array![2.0]).unwrap(), 2.0);
    }
}
