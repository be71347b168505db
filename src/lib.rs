//! # chainfit-rs
//!
//! `chainfit-rs` fits parametric calibration models to measurements whose
//! independent and dependent variables all carry (possibly asymmetric)
//! uncertainties.
//!
//! The library provides:
//! - A measurement store with default-uncertainty substitution
//! - Recipe chaining: correcting a dataset with the prediction of a previously
//!   fit model and propagating that model's parameter covariance
//! - A generalized-least-squares chi-square over the resulting correlated
//!   covariance, or a diagonal effective-variance chi-square
//! - A bounded Levenberg-Marquardt minimizer with Minuit-style convergence
//! - Parameter errors and correlations, a text report and a persisted recipe log
//!
//! ## Basic Usage
//!
//! ```
//! use chainfit_rs::covariance::identity_block;
//! use chainfit_rs::data::Measurement;
//! use chainfit_rs::fit::{FitDriver, FitInputs};
//! use chainfit_rs::lm::MinimizerConfig;
//! use chainfit_rs::model::{Formula, ModelDefinition, ModelKey};
//! use ndarray::array;
//!
//! let model = ModelDefinition::new(
//!     ModelKey::new("Lin", 0),
//!     Formula::parse("[0] * x").unwrap(),
//!     array![5.0],
//!     array![0.0],
//!     array![100.0],
//!     array![0.5],
//!     vec![],
//! )
//! .unwrap();
//!
//! let measurements = vec![
//!     Measurement::from_fields(&[1.0, 0.1, 0.1, 0.0, 0.0, 0.0, 10.0, 1.0, 1.0]),
//!     Measurement::from_fields(&[2.0, 0.1, 0.1, 0.0, 0.0, 0.0, 20.0, 1.0, 1.0]),
//!     Measurement::from_fields(&[3.0, 0.1, 0.1, 0.0, 0.0, 0.0, 31.0, 1.0, 1.0]),
//! ];
//! let covariance = identity_block(&measurements);
//!
//! let mut driver = FitDriver::new(MinimizerConfig::default());
//! driver
//!     .configure(model, FitInputs { measurements, covariance, generalized: false })
//!     .unwrap();
//! let result = driver.minimize().unwrap();
//! assert!(result.params[0] > 10.2 && result.params[0] < 10.3);
//! ```

// Public modules
pub mod error;

pub mod config;
pub mod data;
pub mod model;
pub mod recipe;

pub mod covariance;
pub mod objective;
pub mod problem;
pub mod utils;

pub mod lm;
pub mod uncertainty;

pub mod fit;
pub mod report;

pub mod app;

// Re-exports for convenience
pub use error::{FitError, Result};
pub use fit::{FitDriver, FitResult, FitState};
pub use lm::LevenbergMarquardt;
pub use problem::Problem;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
