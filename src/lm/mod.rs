//! Bounded Levenberg-Marquardt minimization.
//!
//! The minimizer drives a [`Problem`](crate::problem::Problem) to the minimum
//! of its sum of squared residuals while keeping each parameter inside its
//! box limits. Convergence is judged by the estimated distance to minimum, as
//! in Minuit.

pub mod algorithm;
pub mod bounds;
pub mod config;
pub mod convergence;

// Re-export key types
pub use algorithm::{LevenbergMarquardt, MinimizerResult};
pub use bounds::{Bounds, BoundsError, BoundsTransform};
pub use config::MinimizerConfig;
pub use convergence::ConvergenceStatus;
