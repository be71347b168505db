//! Utility functions and helpers.

pub mod finite_difference;
pub mod matrix_convert;

// Re-export commonly used utilities
pub use finite_difference::{derivative, step_size, Axis, Point};
pub use matrix_convert::{
    nalgebra_to_ndarray, ndarray_to_faer, ndarray_to_faer_transposed, ndarray_to_nalgebra,
    ndarray_vec_to_faer,
};
