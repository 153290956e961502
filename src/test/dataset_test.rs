use crate::dataset::{Dataset, denormalize, normalize};
use crate::error::ModelError;
use approx::assert_abs_diff_eq;
use ndarray::{arr1, arr2};

#[test]
fn computes_target_statistics() {
    let data = Dataset::new(
        arr2(&[[0.0], [1.0], [2.0], [3.0]]),
        arr1(&[1.0, 3.0, 5.0, 7.0]),
    )
    .unwrap();
    assert_eq!(data.len(), 4);
    assert_eq!(data.input_dim(), 1);
    assert_abs_diff_eq!(data.target_mean(), 4.0);
    assert_abs_diff_eq!(data.target_variance(), 5.0);
}

#[test]
fn rejects_mismatched_and_non_finite_data() {
    assert!(matches!(
        Dataset::new(arr2(&[[0.0], [1.0]]), arr1(&[1.0])),
        Err(ModelError::InputValidationError(_))
    ));
    assert!(matches!(
        Dataset::new(arr2(&[[f64::NAN]]), arr1(&[1.0])),
        Err(ModelError::InputValidationError(_))
    ));
    assert!(matches!(
        Dataset::new(arr2(&[[0.0]]), arr1(&[f64::INFINITY])),
        Err(ModelError::InputValidationError(_))
    ));
}

#[test]
fn from_rows_splits_inputs_and_target() {
    let data = Dataset::from_rows(&[vec![0.0, 1.0, 5.0], vec![2.0, 3.0, 7.0]]).unwrap();
    assert_eq!(data.input_dim(), 2);
    assert_abs_diff_eq!(data.input(1)[0], 2.0);
    assert_abs_diff_eq!(data.input(1)[1], 3.0);
    assert_abs_diff_eq!(data.target(0), 5.0);
}

#[test]
fn from_rows_rejects_ragged_rows() {
    assert!(matches!(
        Dataset::from_rows(&[vec![0.0, 1.0], vec![2.0]]),
        Err(ModelError::InputValidationError(_))
    ));
}

#[test]
fn scaling_metadata_round_trips() {
    let data = Dataset::new(arr2(&[[0.1]]), arr1(&[0.2]))
        .unwrap()
        .with_scaling(vec![2.0, 4.0], vec![1.0, 3.0])
        .unwrap();
    assert!(data.is_scaled());
    assert_abs_diff_eq!(data.target_scale_factor(), 4.0);

    let raw = 7.5;
    let normalized = normalize(raw, 2.0, 1.0);
    assert_abs_diff_eq!(data.denormalize_input(0, normalized), raw, epsilon = 1e-12);

    let normalized = normalize(raw, 4.0, 3.0);
    assert_abs_diff_eq!(data.denormalize_target(normalized), raw, epsilon = 1e-12);
}

#[test]
fn default_scaling_is_the_identity() {
    let data = Dataset::new(arr2(&[[0.1]]), arr1(&[0.2])).unwrap();
    assert!(!data.is_scaled());
    assert_abs_diff_eq!(data.denormalize_target(0.25), 0.25);
}

#[test]
fn with_scaling_checks_the_length() {
    let data = Dataset::new(arr2(&[[0.1]]), arr1(&[0.2])).unwrap();
    assert!(matches!(
        data.with_scaling(vec![1.0], vec![0.0]),
        Err(ModelError::InputValidationError(_))
    ));
}

#[test]
fn block_size_defaults_to_the_dataset_length() {
    let data = Dataset::from_rows(&[vec![0.0, 1.0], vec![1.0, 2.0], vec![2.0, 3.0]]).unwrap();
    assert_eq!(data.block_size(), 3);

    let data = data.with_block_size(2).unwrap();
    assert_eq!(data.block_size(), 2);
}

#[test]
fn with_block_size_rejects_zero() {
    let data = Dataset::new(arr2(&[[0.1]]), arr1(&[0.2])).unwrap();
    assert!(matches!(
        data.with_block_size(0),
        Err(ModelError::InputValidationError(_))
    ));
}

#[test]
fn denormalize_inverts_normalize() {
    assert_abs_diff_eq!(denormalize(normalize(3.7, 0.5, -1.0), 0.5, -1.0), 3.7);
}
