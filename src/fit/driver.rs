//! Fit driver state machine.
//!
//! ```text
//! Uninitialized --configure--> Configured --minimize--> Minimizing --> Converged
//!                                                                 \--> Failed
//! ```
//!
//! A driver performs exactly one minimization attempt. Covariance problems
//! surface in `configure`, before the minimizer is ever called.

use std::fmt;

use crate::covariance::CovarianceFactors;
use crate::error::{FitError, Result};
use crate::lm::{Bounds, LevenbergMarquardt, MinimizerConfig};
use crate::model::ModelDefinition;
use crate::objective::{Objective, Weighting};
use crate::uncertainty::{hesse, parameter_covariance, ParameterUncertainty};

use super::inputs::FitInputs;
use super::result::FitResult;

/// Lifecycle of a [`FitDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitState {
    Uninitialized,
    Configured,
    Minimizing,
    Converged,
    Failed,
}

impl fmt::Display for FitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FitState::Uninitialized => "uninitialized",
            FitState::Configured => "configured",
            FitState::Minimizing => "minimizing",
            FitState::Converged => "converged",
            FitState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Data owned by a configured driver.
#[derive(Debug)]
struct Setup {
    model: ModelDefinition,
    inputs: FitInputs,
    bounds: Vec<Bounds>,
    factors: Option<CovarianceFactors>,
}

/// Runs one fit of one model against its assembled data.
#[derive(Debug)]
pub struct FitDriver {
    config: MinimizerConfig,
    state: FitState,
    setup: Option<Setup>,
    result: Option<FitResult>,
}

impl FitDriver {
    pub fn new(config: MinimizerConfig) -> Self {
        Self {
            config,
            state: FitState::Uninitialized,
            setup: None,
            result: None,
        }
    }

    pub fn state(&self) -> FitState {
        self.state
    }

    /// The fit result, present only in the `Converged` state.
    pub fn result(&self) -> Option<&FitResult> {
        self.result.as_ref()
    }

    /// Take ownership of the model and data.
    ///
    /// In generalized mode the global covariance is factorized here; a
    /// singular matrix leaves the driver `Uninitialized`.
    pub fn configure(&mut self, model: ModelDefinition, inputs: FitInputs) -> Result<()> {
        if self.state != FitState::Uninitialized {
            return Err(FitError::InvalidState(format!(
                "cannot configure a {} fit",
                self.state
            )));
        }
        if inputs.is_empty() {
            return Err(FitError::DimensionMismatch(
                "no measurements to fit".to_string(),
            ));
        }
        let n = inputs.len();
        if inputs.covariance.dim() != (n, n) {
            return Err(FitError::DimensionMismatch(format!(
                "{} measurements but a {}x{} covariance",
                n,
                inputs.covariance.nrows(),
                inputs.covariance.ncols()
            )));
        }

        let bounds = Bounds::from_limits(&model.lower, &model.upper)?;
        let factors = if inputs.generalized {
            Some(CovarianceFactors::new(inputs.covariance.clone())?)
        } else {
            None
        };

        log::info!(
            "configured {} with {} parameters and {} measurements ({})",
            model.key,
            model.parameter_count(),
            n,
            if factors.is_some() { "generalized" } else { "diagonal" }
        );

        self.setup = Some(Setup {
            model,
            inputs,
            bounds,
            factors,
        });
        self.state = FitState::Configured;
        Ok(())
    }

    /// Run the single minimization attempt.
    ///
    /// Fails with [`FitError::InvalidState`] unless the driver is `Configured`.
    /// Non-convergence moves the driver to `Failed` and is reported as
    /// [`FitError::MinimizerNonConvergence`].
    pub fn minimize(&mut self) -> Result<&FitResult> {
        if self.state != FitState::Configured {
            return Err(FitError::InvalidState(format!(
                "minimize called on a {} fit",
                self.state
            )));
        }
        self.state = FitState::Minimizing;

        match self.run() {
            Ok(result) => {
                self.state = FitState::Converged;
                Ok(self.result.insert(result))
            }
            Err(e) => {
                self.state = FitState::Failed;
                Err(e)
            }
        }
    }

    fn run(&self) -> Result<FitResult> {
        let setup = self.setup.as_ref().ok_or_else(|| {
            FitError::InvalidState("driver has no configuration".to_string())
        })?;
        let model = &setup.model;
        let weighting = match &setup.factors {
            Some(factors) => Weighting::Generalized(factors),
            None => Weighting::Diagonal,
        };
        let objective = Objective::new(model, &setup.inputs.measurements, weighting)?;

        let minimizer = LevenbergMarquardt::with_config(self.config.clone());
        let minimum = minimizer.minimize(&objective, &model.initial, &setup.bounds, &model.steps)?;
        log::debug!("{}", minimum);

        if !minimum.success() {
            log::error!(
                "the minimizer threw a flag; set Verbosity above 0 for details"
            );
            return Err(FitError::MinimizerNonConvergence {
                flag: minimum.error_flag(),
                message: format!(
                    "{} after {} calls (chi2 = {:.6e}, edm = {:.3e})",
                    minimum.status.description(),
                    minimum.calls,
                    minimum.chi2,
                    minimum.edm
                ),
            });
        }

        let (covariance, extra_calls) = if self.config.hesse {
            match hesse(&objective, &minimum.params, &setup.bounds, self.config.up) {
                Ok(refined) => refined,
                // The minimum stands; only the refinement is lost
                Err(
                    e @ (FitError::SingularCovariance(_)
                    | FitError::FunctionEvaluation(_)
                    | FitError::Expression(_)),
                ) => {
                    log::warn!("Hesse failed ({}); keeping the minimizer covariance", e);
                    (parameter_covariance(&minimum.jacobian, self.config.up)?, 0)
                }
                Err(e) => return Err(e),
            }
        } else {
            (parameter_covariance(&minimum.jacobian, self.config.up)?, 0)
        };

        Ok(FitResult::new(
            model,
            &minimum,
            ParameterUncertainty::from_covariance(covariance),
            setup.inputs.len(),
            extra_calls,
            setup.factors.is_some(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::covariance::identity_block;
    use crate::data::Measurement;
    use crate::model::{Formula, ModelKey};
    use ndarray::{array, Array2};

    fn model() -> ModelDefinition {
        ModelDefinition::new(
            ModelKey::new("Lin", 0),
            Formula::parse("[0] * x").unwrap(),
            array![5.0],
            array![0.0],
            array![100.0],
            array![0.5],
            vec![],
        )
        .unwrap()
    }

    fn inputs() -> FitInputs {
        let measurements = vec![
            Measurement::from_fields(&[1.0, 0.1, 0.1, 0.0, 0.0, 0.0, 10.0, 1.0, 1.0]),
            Measurement::from_fields(&[2.0, 0.1, 0.1, 0.0, 0.0, 0.0, 20.0, 1.0, 1.0]),
            Measurement::from_fields(&[3.0, 0.1, 0.1, 0.0, 0.0, 0.0, 31.0, 1.0, 1.0]),
        ];
        let covariance = identity_block(&measurements);
        FitInputs {
            measurements,
            covariance,
            generalized: false,
        }
    }

    #[test]
    fn test_state_transitions() {
        let mut driver = FitDriver::new(MinimizerConfig::default());
        assert_eq!(driver.state(), FitState::Uninitialized);
        assert!(matches!(driver.minimize(), Err(FitError::InvalidState(_))));

        driver.configure(model(), inputs()).unwrap();
        assert_eq!(driver.state(), FitState::Configured);
        assert!(driver.result().is_none());

        let a = driver.minimize().unwrap().params[0];
        assert!(a > 10.2 && a < 10.3, "a = {}", a);
        assert_eq!(driver.state(), FitState::Converged);

        // Single shot
        assert!(matches!(driver.minimize(), Err(FitError::InvalidState(_))));
        assert!(driver.result().is_some());
    }

    #[test]
    fn test_configure_twice_is_rejected() {
        let mut driver = FitDriver::new(MinimizerConfig::default());
        driver.configure(model(), inputs()).unwrap();
        assert!(matches!(
            driver.configure(model(), inputs()),
            Err(FitError::InvalidState(_))
        ));
    }

    #[test]
    fn test_singular_covariance_aborts_configuration() {
        let mut bad = inputs();
        bad.generalized = true;
        bad.covariance = Array2::zeros((3, 3));
        let mut driver = FitDriver::new(MinimizerConfig::default());
        assert!(matches!(
            driver.configure(model(), bad),
            Err(FitError::SingularCovariance(_))
        ));
        assert_eq!(driver.state(), FitState::Uninitialized);
    }

    #[test]
    fn test_call_budget_exhausted_fails() {
        let config = MinimizerConfig {
            max_calls: 2,
            ..MinimizerConfig::default()
        };
        let mut driver = FitDriver::new(config);
        driver.configure(model(), inputs()).unwrap();
        assert!(matches!(
            driver.minimize(),
            Err(FitError::MinimizerNonConvergence { flag: 4, .. })
        ));
        assert_eq!(driver.state(), FitState::Failed);
        assert!(driver.result().is_none());
    }
}
