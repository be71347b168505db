//! Linear error propagation through a chained recipe model.

use ndarray::{s, Array2};

use crate::data::Measurement;
use crate::error::{FitError, Result};
use crate::model::{Arity, ModelDefinition};
use crate::recipe::RecipeLog;
use crate::utils::finite_difference::{Axis, Point};

/// `J · V · Jᵗ`, symmetrized to remove rounding asymmetry.
pub fn propagate(jacobian: &Array2<f64>, input_covariance: &Array2<f64>) -> Result<Array2<f64>> {
    let n_in = input_covariance.nrows();
    if input_covariance.ncols() != n_in || jacobian.ncols() != n_in {
        return Err(FitError::DimensionMismatch(format!(
            "cannot propagate a {}x{} covariance through a {}x{} Jacobian",
            input_covariance.nrows(),
            input_covariance.ncols(),
            jacobian.nrows(),
            jacobian.ncols()
        )));
    }
    let out = jacobian.dot(input_covariance).dot(&jacobian.t());
    Ok(symmetrize(out))
}

/// `(V + Vᵗ) / 2`
pub fn symmetrize(v: Array2<f64>) -> Array2<f64> {
    let t = v.t().to_owned();
    (v + t) * 0.5
}

/// Covariance of the corrected responses `M(x, y; p̂) - z` of a chained dataset.
///
/// The inputs are ordered `[z_1..z_N, x_1..x_N, y_1..y_N, p_1..p_P]` with
/// block-diagonal covariance `diag(V_N, V_E, V_F, V_P)`. The Jacobian has
/// `-1` on the response diagonal, `∂M/∂x` and `∂M/∂y` on their diagonals and
/// dense `∂M/∂p` columns. `measurements` must still hold the raw responses
/// and error bars.
pub fn chained_covariance(
    model: &ModelDefinition,
    fitted: &RecipeLog,
    measurements: &[Measurement],
) -> Result<Array2<f64>> {
    let n = measurements.len();
    let p = model.parameter_count();
    if fitted.parameter_count() != p || fitted.covariance.dim() != (p, p) {
        return Err(FitError::DimensionMismatch(format!(
            "recipe log for {} holds {} parameters and a {}x{} covariance, model has {}",
            model.key,
            fitted.parameter_count(),
            fitted.covariance.nrows(),
            fitted.covariance.ncols(),
            p
        )));
    }

    let dim = 3 * n + p;
    let mut input = Array2::<f64>::zeros((dim, dim));
    let mut jac = Array2::<f64>::zeros((n, dim));
    let params = fitted.params.view();

    for (i, m) in measurements.iter().enumerate() {
        input[[i, i]] = m.z_variance();
        input[[n + i, n + i]] = m.mean_x_err().powi(2);
        input[[2 * n + i, 2 * n + i]] = m.mean_y_err().powi(2);

        let point = Point::new(m.x, m.y);
        jac[[i, i]] = -1.0;
        jac[[i, n + i]] = model.derivative(point, params, Axis::X)?;
        if model.arity() == Arity::TwoArgument {
            jac[[i, 2 * n + i]] = model.derivative(point, params, Axis::Y)?;
        }
        for k in 0..p {
            jac[[i, 3 * n + k]] = model.derivative(point, params, Axis::Parameter(k))?;
        }
    }
    input
        .slice_mut(s![3 * n.., 3 * n..])
        .assign(&fitted.covariance);

    propagate(&jac, &input)
}
