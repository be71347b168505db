//! Matrix conversion utilities.
//!
//! Owned data lives in `ndarray` buffers throughout the crate. The minimizer
//! forms its normal-equation products with `faer`, and factorizations
//! (Cholesky, inversion, eigen-decomposition) go through `nalgebra`. These
//! helpers copy between the three layouts element by element, so they do not
//! care that ndarray is row-major and the other two are column-major.

use faer::Mat;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

// === ndarray <-> faer ===

/// Convert an ndarray matrix to a faer `Mat`.
pub fn ndarray_to_faer(arr: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert an ndarray vector to an `n x 1` faer matrix.
pub fn ndarray_vec_to_faer(arr: &Array1<f64>) -> Mat<f64> {
    Mat::from_fn(arr.len(), 1, |i, _| arr[i])
}

/// Transpose of an ndarray matrix as a faer `Mat`.
pub fn ndarray_to_faer_transposed(arr: &Array2<f64>) -> Mat<f64> {
    Mat::from_fn(arr.ncols(), arr.nrows(), |i, j| arr[[j, i]])
}

// === ndarray <-> nalgebra ===

/// Convert an ndarray matrix to a nalgebra `DMatrix`.
pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert a nalgebra `DMatrix` to an ndarray matrix.
pub fn nalgebra_to_ndarray(mat: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}
