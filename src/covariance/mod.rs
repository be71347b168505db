//! Global measurement covariance.
//!
//! Every dataset contributes one diagonal block: raw datasets a diagonal of
//! response variances, chained datasets the dense block propagated through
//! their recipe model. Blocks are placed in global measurement order and
//! cross-dataset entries stay zero. The assembled matrix is factorized once,
//! `V = L·Lᵗ`, and the fit works with the whitened residuals `L⁻¹ r`.

pub mod propagation;

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use ndarray::{s, Array1, Array2};

use crate::data::Measurement;
use crate::error::{FitError, Result};
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};

pub use propagation::{chained_covariance, propagate, symmetrize};

/// Diagonal block `((zErrLow + zErrHigh) / 2)²` for a raw dataset.
pub fn identity_block(measurements: &[Measurement]) -> Array2<f64> {
    Array2::from_diag(&Array1::from_iter(
        measurements.iter().map(Measurement::z_variance),
    ))
}

/// Assembles dataset blocks into the global covariance, in order.
#[derive(Debug, Clone)]
pub struct CovarianceBuilder {
    matrix: Array2<f64>,
    offset: usize,
}

impl CovarianceBuilder {
    /// Allocate for `n` measurements in total.
    pub fn new(n: usize) -> Self {
        Self {
            matrix: Array2::zeros((n, n)),
            offset: 0,
        }
    }

    /// Place the next dataset's block on the diagonal.
    pub fn push_block(&mut self, block: &Array2<f64>) -> Result<()> {
        let n = block.nrows();
        let end = self.offset + n;
        if block.ncols() != n || end > self.matrix.nrows() {
            return Err(FitError::DimensionMismatch(format!(
                "{}x{} block does not fit at offset {} of a {}x{} covariance",
                block.nrows(),
                block.ncols(),
                self.offset,
                self.matrix.nrows(),
                self.matrix.ncols()
            )));
        }
        self.matrix
            .slice_mut(s![self.offset..end, self.offset..end])
            .assign(block);
        self.offset = end;
        Ok(())
    }

    /// Finish assembly; every row must have been covered by a block.
    pub fn finish(self) -> Result<Array2<f64>> {
        if self.offset != self.matrix.nrows() {
            return Err(FitError::DimensionMismatch(format!(
                "covariance blocks cover {} of {} measurements",
                self.offset,
                self.matrix.nrows()
            )));
        }
        Ok(self.matrix)
    }
}

/// Cholesky factors of the global covariance.
#[derive(Debug, Clone)]
pub struct CovarianceFactors {
    /// `V`
    pub covariance: Array2<f64>,
    /// `V⁻¹`
    pub inverse: Array2<f64>,
    /// `L⁻¹` with `V = L·Lᵗ`
    pub whitening: Array2<f64>,
}

impl CovarianceFactors {
    /// Factorize and invert `V`.
    ///
    /// Fails with [`FitError::SingularCovariance`] when `V` is not square,
    /// contains non-finite entries or is not positive definite.
    pub fn new(covariance: Array2<f64>) -> Result<Self> {
        let n = covariance.nrows();
        if covariance.ncols() != n {
            return Err(FitError::SingularCovariance(format!(
                "covariance is {}x{}",
                n,
                covariance.ncols()
            )));
        }
        if let Some(((i, j), v)) = covariance.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(FitError::SingularCovariance(format!(
                "entry ({}, {}) is {}",
                i, j, v
            )));
        }

        let chol = Cholesky::new(ndarray_to_nalgebra(&covariance)).ok_or_else(|| {
            FitError::SingularCovariance("matrix is not positive definite".to_string())
        })?;
        let l = chol.l();
        let l_inv = l
            .solve_lower_triangular(&DMatrix::identity(n, n))
            .ok_or_else(|| {
                FitError::SingularCovariance("Cholesky factor is singular".to_string())
            })?;
        let inverse = chol.inverse();

        log::debug!("factorized {}x{} measurement covariance", n, n);
        Ok(Self {
            covariance,
            inverse: nalgebra_to_ndarray(&inverse),
            whitening: nalgebra_to_ndarray(&l_inv),
        })
    }

    pub fn dim(&self) -> usize {
        self.covariance.nrows()
    }

    /// `L⁻¹ r`, whose squared norm is `rᵗ V⁻¹ r`.
    pub fn whiten(&self, residuals: &Array1<f64>) -> Result<Array1<f64>> {
        if residuals.len() != self.dim() {
            return Err(FitError::DimensionMismatch(format!(
                "{} residuals for a {}x{} covariance",
                residuals.len(),
                self.dim(),
                self.dim()
            )));
        }
        Ok(self.whitening.dot(residuals))
    }

    /// `rᵗ V⁻¹ r`
    pub fn chi_square(&self, residuals: &Array1<f64>) -> Result<f64> {
        Ok(self.whiten(residuals)?.mapv(|w| w * w).sum())
    }
}

/// Eigenvalues of a symmetric matrix, ascending.
pub fn eigenvalues(matrix: &Array2<f64>) -> Array1<f64> {
    let eig = SymmetricEigen::new(ndarray_to_nalgebra(matrix));
    let mut values: Vec<f64> = eig.eigenvalues.iter().copied().collect();
    values.sort_by(|a, b| a.total_cmp(b));
    Array1::from_vec(values)
}

/// Whether `matrix` is symmetric (to `tol`) with no eigenvalue below `-tol`.
pub fn is_positive_semidefinite(matrix: &Array2<f64>, tol: f64) -> bool {
    if matrix.nrows() != matrix.ncols() {
        return false;
    }
    let symmetric = matrix
        .indexed_iter()
        .all(|((i, j), v)| (v - matrix[[j, i]]).abs() <= tol);
    symmetric && eigenvalues(matrix).iter().all(|&e| e >= -tol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_identity_block() {
        let a = Measurement::from_fields(&[1.0, 0.1, 0.1, 0.0, 0.0, 0.0, 10.0, 1.0, 3.0]);
        let b = Measurement::from_fields(&[2.0, 0.1, 0.1, 0.0, 0.0, 0.0, 20.0, 0.5, 0.5]);
        let block = identity_block(&[a, b]);
        assert_eq!(block, array![[4.0, 0.0], [0.0, 0.25]]);
    }

    #[test]
    fn test_builder_places_blocks() {
        let mut builder = CovarianceBuilder::new(3);
        builder.push_block(&array![[1.0]]).unwrap();
        builder
            .push_block(&array![[2.0, 0.5], [0.5, 3.0]])
            .unwrap();
        let v = builder.finish().unwrap();
        assert_eq!(v[[2, 1]], 0.5);
        assert_eq!(v[[0, 1]], 0.0);
        assert_eq!(v[[0, 0]], 1.0);
    }

    #[test]
    fn test_builder_rejects_gaps_and_overflow() {
        let mut builder = CovarianceBuilder::new(2);
        assert!(builder.push_block(&Array2::eye(3)).is_err());
        builder.push_block(&Array2::eye(1)).unwrap();
        assert!(builder.finish().is_err());
    }

    #[test]
    fn test_factors() {
        let v = array![[4.0, 1.0], [1.0, 2.0]];
        let factors = CovarianceFactors::new(v.clone()).unwrap();

        let product = v.dot(&factors.inverse);
        assert_relative_eq!(product[[0, 0]], 1.0, epsilon = 1e-12);
        assert_relative_eq!(product[[0, 1]], 0.0, epsilon = 1e-12);

        let r = array![1.0, -2.0];
        let direct = r.dot(&factors.inverse.dot(&r));
        assert_relative_eq!(factors.chi_square(&r).unwrap(), direct, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_covariance() {
        let v = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(matches!(
            CovarianceFactors::new(v),
            Err(FitError::SingularCovariance(_))
        ));
        assert!(CovarianceFactors::new(array![[f64::NAN]]).is_err());
        assert!(CovarianceFactors::new(array![[0.0]]).is_err());
    }

    #[test]
    fn test_psd_check() {
        assert!(is_positive_semidefinite(&array![[2.0, 1.0], [1.0, 2.0]], 1e-12));
        assert!(!is_positive_semidefinite(&array![[1.0, 2.0], [2.0, 1.0]], 1e-12));
        assert!(!is_positive_semidefinite(&array![[1.0, 0.5], [0.0, 1.0]], 1e-12));
    }
}
