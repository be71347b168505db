//! The outcome of a successful fit.

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lm::MinimizerResult;
use crate::model::{ModelDefinition, ModelKey};
use crate::recipe::RecipeLog;
use crate::uncertainty::ParameterUncertainty;

/// File name of the JSON copy of a fit result: `<Type><Id>Result.json`.
pub fn json_file_name(key: &ModelKey) -> String {
    format!("{}Result.json", key)
}

/// Fitted parameters with their uncertainties and goodness of fit.
///
/// Created once by the [`FitDriver`](super::FitDriver) after the minimizer
/// converged; never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKey,
    pub formula: String,
    pub params: Array1<f64>,
    pub errors: Array1<f64>,
    pub covariance: Array2<f64>,
    pub correlation: Array2<f64>,
    pub chi2: f64,
    pub edm: f64,
    pub converged: bool,
    /// Number of measurements in the fit
    pub n_data: usize,
    /// `n_data - P`
    pub dof: usize,
    /// `chi2 / dof`, absent when there are no degrees of freedom
    pub reduced_chi2: Option<f64>,
    /// Objective evaluations, including Hesse
    pub calls: usize,
    /// Whether the full measurement covariance was used
    pub generalized: bool,
}

impl FitResult {
    pub(crate) fn new(
        model: &ModelDefinition,
        minimum: &MinimizerResult,
        uncertainty: ParameterUncertainty,
        n_data: usize,
        extra_calls: usize,
        generalized: bool,
    ) -> Self {
        let dof = n_data.saturating_sub(model.parameter_count());
        let reduced_chi2 = (dof > 0).then(|| minimum.chi2 / dof as f64);
        Self {
            model: model.key.clone(),
            formula: model.formula.text().to_string(),
            params: minimum.params.clone(),
            errors: uncertainty.errors,
            covariance: uncertainty.covariance,
            correlation: uncertainty.correlation,
            chi2: minimum.chi2,
            edm: minimum.edm,
            converged: minimum.success(),
            n_data,
            dof,
            reduced_chi2,
            calls: minimum.calls + extra_calls,
            generalized,
        }
    }

    /// Best fit and covariance in the form later fits chain from.
    pub fn to_recipe_log(&self) -> Result<RecipeLog> {
        RecipeLog::new(self.params.clone(), self.covariance.clone())
    }

    /// Write `<Type><Id>Log.txt` into `dir`.
    pub fn save_log(&self, dir: &Path) -> Result<PathBuf> {
        self.to_recipe_log()?.save(dir, &self.model)
    }

    /// Write `<Type><Id>Result.json` into `dir`.
    pub fn save_json(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(json_file_name(&self.model));
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        log::info!("wrote fit result {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> FitResult {
        FitResult {
            model: ModelKey::new("NRQY", 2),
            formula: "[0]*x".into(),
            params: array![10.25, 0.1],
            errors: array![0.2, 0.01],
            covariance: array![[0.04, 0.001], [0.001, 0.0001]],
            correlation: array![[1.0, 0.5], [0.5, 1.0]],
            chi2: 1.5,
            edm: 1e-7,
            converged: true,
            n_data: 5,
            dof: 3,
            reduced_chi2: Some(0.5),
            calls: 42,
            generalized: false,
        }
    }

    #[test]
    fn test_recipe_log_from_result() {
        let result = sample();
        let log = result.to_recipe_log().unwrap();
        assert_eq!(log.params, result.params);
        assert_eq!(log.covariance, result.covariance);
    }

    #[test]
    fn test_json_round_trip() {
        let result = sample();
        let json = serde_json::to_string(&result).unwrap();
        let back: FitResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert!(json.contains("\"reduced_chi2\":0.5"));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(json_file_name(&ModelKey::new("NRQY", 2)), "NRQY2Result.json");
    }
}
