//! Fit driver: one model, its assembled data, one minimization.

pub mod driver;
pub mod inputs;
pub mod result;

pub use driver::{FitDriver, FitState};
pub use inputs::{assemble, FitInputs};
pub use result::{json_file_name, FitResult};
