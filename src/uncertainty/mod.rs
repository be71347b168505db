//! # Parameter Uncertainty
//!
//! Standard errors and correlations of fitted parameters, derived from the
//! parameter covariance at the minimum.

mod covariance;

pub use covariance::{
    calculate_correlation, hesse, hessian_covariance, parameter_covariance,
    standard_errors_from_covariance,
};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Covariance, standard errors and correlation of a set of parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUncertainty {
    pub covariance: Array2<f64>,
    pub errors: Array1<f64>,
    pub correlation: Array2<f64>,
}

impl ParameterUncertainty {
    pub fn from_covariance(covariance: Array2<f64>) -> Self {
        let errors = standard_errors_from_covariance(&covariance);
        let correlation = calculate_correlation(&covariance);
        Self {
            covariance,
            errors,
            correlation,
        }
    }
}
