use approx::assert_relative_eq;
use chainfit_rs::model::{Formula, ModelDefinition, ModelKey};
use chainfit_rs::utils::finite_difference::{self, derivative, step_size, Axis, Point};
use chainfit_rs::Result;
use ndarray::{array, Array1, ArrayView1};

fn model(formula: &str, params: Array1<f64>) -> ModelDefinition {
    let n = params.len();
    ModelDefinition::new(
        ModelKey::new("D", 0),
        Formula::parse(formula).unwrap(),
        params,
        Array1::from_elem(n, -100.0),
        Array1::from_elem(n, 100.0),
        Array1::from_elem(n, 0.1),
        vec![],
    )
    .unwrap()
}

fn wave(p: Point, q: ArrayView1<f64>) -> Result<f64> {
    Ok(q[0] * p.x.sin() * (q[1] * p.y).exp())
}

fn exp_cubic(p: Point, _: ArrayView1<f64>) -> Result<f64> {
    Ok(p.x.exp() + p.x.powi(3))
}

#[test]
fn test_step_policy() {
    assert_eq!(step_size(10.0), 1e-2);
    assert_eq!(step_size(-10.0), 1e-2);
    assert_eq!(step_size(0.0), 1e-4);
    assert_eq!(step_size(1e-3), 1e-4);
}

#[test]
fn test_point_derivatives_match_closed_forms() {
    let params = array![2.0, 0.3];
    for &(x, y) in &[(1.0, 2.0), (-3.0, 0.5), (0.25, -4.0)] {
        let point = Point::new(x, y);
        let dx = derivative(wave, point, params.view(), Axis::X).unwrap();
        let dy = derivative(wave, point, params.view(), Axis::Y).unwrap();
        let dp1 = derivative(wave, point, params.view(), Axis::Parameter(1)).unwrap();

        let e = (0.3 * y).exp();
        assert_relative_eq!(dx, 2.0 * x.cos() * e, epsilon = 1e-9);
        assert_relative_eq!(dy, 2.0 * x.sin() * 0.3 * e, epsilon = 1e-9);
        assert_relative_eq!(dp1, 2.0 * x.sin() * y * e, epsilon = 1e-9);
    }
}

#[test]
fn test_derivative_near_zero() {
    let none = Array1::<f64>::zeros(0);
    for &x in &[0.0, 1e-8, -1e-6] {
        let d = derivative(exp_cubic, Point::new(x, 0.0), none.view(), Axis::X).unwrap();
        assert_relative_eq!(d, x.exp() + 3.0 * x * x, epsilon = 1e-9);
    }
}

#[test]
fn test_model_derivatives() {
    let m = model("[0] * x^2 + [1] * log(y)", array![1.5, -2.0]);
    let point = Point::new(3.0, 4.0);
    let p = m.initial.view();

    assert_relative_eq!(m.derivative(point, p, Axis::X).unwrap(), 9.0, epsilon = 1e-9);
    assert_relative_eq!(m.derivative(point, p, Axis::Y).unwrap(), -0.5, epsilon = 1e-9);
    assert_relative_eq!(m.derivative(point, p, Axis::Parameter(0)).unwrap(), 9.0, epsilon = 1e-9);
    assert_relative_eq!(
        m.derivative(point, p, Axis::Parameter(1)).unwrap(),
        4.0f64.ln(),
        epsilon = 1e-9
    );
    assert!(m.derivative(point, p, Axis::Parameter(2)).is_err());
}

#[test]
fn test_evaluation_failures_propagate() {
    // log of a negative argument
    let m = model("[0] * log(x)", array![1.0]);
    assert!(m
        .derivative(Point::new(0.0, 0.0), m.initial.view(), Axis::X)
        .is_err());
}

#[test]
fn test_jacobian_central_and_one_sided() {
    let x = array![0.0, 1.0, 2.0];
    let residuals = |p: &Array1<f64>| -> Result<Array1<f64>> { Ok(x.mapv(|v| p[0] * v * v + p[1])) };
    let steps = array![0.1, 0.1];

    // Interior point: central differences
    let (jac, evals) = finite_difference::jacobian(
        residuals,
        &array![1.0, 1.0],
        &steps,
        &array![-10.0, -10.0],
        &array![10.0, 10.0],
        1e-3,
    )
    .unwrap();
    assert_eq!(evals, 5);
    for (i, &v) in x.iter().enumerate() {
        assert_relative_eq!(jac[[i, 0]], v * v, epsilon = 1e-8);
        assert_relative_eq!(jac[[i, 1]], 1.0, epsilon = 1e-8);
    }

    // Parameter 0 sits on its upper limit: one-sided, pointing inward
    let (jac, evals) = finite_difference::jacobian(
        residuals,
        &array![2.0, 1.0],
        &steps,
        &array![0.0, -10.0],
        &array![2.0, 10.0],
        1e-3,
    )
    .unwrap();
    assert_eq!(evals, 4);
    assert_relative_eq!(jac[[2, 0]], 4.0, epsilon = 1e-8);
}

#[test]
fn test_hessian_of_quadratic() {
    let f = |p: &Array1<f64>| -> Result<f64> { Ok(3.0 * p[0] * p[0] + 2.0 * p[0] * p[1] + p[1] * p[1]) };
    let (h, evals) = finite_difference::hessian(f, &array![0.5, -1.0], &array![1e-3, 1e-3]).unwrap();
    assert_eq!(evals, 1 + 2 * 2 + 4);
    assert_relative_eq!(h[[0, 0]], 6.0, epsilon = 1e-5);
    assert_relative_eq!(h[[0, 1]], 2.0, epsilon = 1e-5);
    assert_relative_eq!(h[[1, 0]], 2.0, epsilon = 1e-5);
    assert_relative_eq!(h[[1, 1]], 2.0, epsilon = 1e-5);
}
