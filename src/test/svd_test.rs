use crate::error::ModelError;
use crate::svd::{solve_least_squares, svd};
use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2, arr1, arr2};

fn assert_reconstructs(a: &Array2<f64>) {
    let (u, q, v) = svd(a).unwrap();
    let rebuilt = u.dot(&Array2::from_diag(&q)).dot(&v.t());
    for (x, y) in a.iter().zip(rebuilt.iter()) {
        assert_abs_diff_eq!(x, y, epsilon = 1e-10);
    }
    for s in q.iter() {
        assert!(*s >= 0.0, "singular value {} is negative", s);
    }
}

#[test]
fn decomposes_a_square_matrix() {
    assert_reconstructs(&arr2(&[[4.0, 0.0], [3.0, -5.0]]));
}

#[test]
fn decomposes_a_tall_matrix() {
    assert_reconstructs(&arr2(&[
        [1.0, 2.0, 3.0],
        [4.0, 5.0, 6.0],
        [7.0, 8.0, 10.0],
        [2.0, -1.0, 0.5],
        [0.0, 3.0, -2.0],
    ]));
}

#[test]
fn decomposes_a_rank_deficient_matrix() {
    // Second column is twice the first.
    let a = arr2(&[[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]]);
    let (u, q, v) = svd(&a).unwrap();
    let rebuilt = u.dot(&Array2::from_diag(&q)).dot(&v.t());
    for (x, y) in a.iter().zip(rebuilt.iter()) {
        assert_abs_diff_eq!(x, y, epsilon = 1e-10);
    }
    let mut sorted: Vec<f64> = q.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_abs_diff_eq!(sorted[0], 0.0, epsilon = 1e-10);
}

#[test]
fn u_columns_are_orthonormal() {
    let a = arr2(&[[1.0, 0.5], [0.5, 2.0], [1.5, -1.0], [0.0, 1.0]]);
    let (u, _, v) = svd(&a).unwrap();
    let utu = u.t().dot(&u);
    let vtv = v.t().dot(&v);
    for i in 0..2 {
        for j in 0..2 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(utu[[i, j]], expected, epsilon = 1e-10);
            assert_abs_diff_eq!(vtv[[i, j]], expected, epsilon = 1e-10);
        }
    }
}

#[test]
fn rejects_wide_matrices() {
    let a = arr2(&[[1.0, 2.0, 3.0]]);
    assert!(matches!(
        svd(&a),
        Err(ModelError::SvdUnderdetermined { rows: 1, cols: 3 })
    ));
}

#[test]
fn least_squares_recovers_an_exact_line() {
    // y = 0 + 2u over four samples, regressors [1, u].
    let a = arr2(&[[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]]);
    let y = arr1(&[0.0, 2.0, 4.0, 6.0]);
    let x = solve_least_squares(&a, &y).unwrap();
    assert_abs_diff_eq!(x[0], 0.0, epsilon = 1e-10);
    assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-10);
}

#[test]
fn least_squares_minimizes_the_residual_of_noisy_data() {
    let a = arr2(&[[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]]);
    let y = arr1(&[0.1, 1.9, 4.1, 5.9]);
    let x = solve_least_squares(&a, &y).unwrap();
    assert_abs_diff_eq!(x[1], 1.96, epsilon = 1e-6);

    // The normal equations hold at the minimum: A^T (A x - y) = 0.
    let residual = a.dot(&x) - &y;
    let gradient = a.t().dot(&residual);
    for g in gradient.iter() {
        assert_abs_diff_eq!(*g, 0.0, epsilon = 1e-10);
    }
}

#[test]
fn least_squares_survives_a_collinear_design() {
    // Duplicate regressor columns, as produced by identical rule weights.
    let a = arr2(&[[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]]);
    let y = arr1(&[2.0, 4.0, 6.0]);
    let x = solve_least_squares(&a, &y).unwrap();
    assert!(x.iter().all(|v| v.is_finite()));

    let fitted = a.dot(&x);
    for (f, t) in fitted.iter().zip(y.iter()) {
        assert_abs_diff_eq!(f, t, epsilon = 1e-10);
    }
}

#[test]
fn least_squares_checks_the_right_hand_side_length() {
    let a = arr2(&[[1.0, 0.0], [1.0, 1.0]]);
    let y: Array1<f64> = arr1(&[1.0]);
    assert!(matches!(
        solve_least_squares(&a, &y),
        Err(ModelError::InputValidationError(_))
    ));
}
