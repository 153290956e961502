use crate::config::MembershipShape;
use crate::membership::MembershipFunction;
use approx::assert_abs_diff_eq;

const BAND: (f64, f64) = (f64::MIN_POSITIVE, 200.0);

#[test]
fn sigmoid_is_half_at_center_and_rises_with_positive_steepness() {
    let fset = MembershipFunction::new(0.2, 10.0, BAND);
    assert_abs_diff_eq!(fset.value(0.2, MembershipShape::Sigmoid), 0.5, epsilon = 1e-12);
    assert!(fset.value(0.5, MembershipShape::Sigmoid) > 0.9);
    assert!(fset.value(-0.1, MembershipShape::Sigmoid) < 0.1);
}

#[test]
fn negative_steepness_falls() {
    let fset = MembershipFunction::new(0.0, -10.0, BAND);
    assert!(fset.value(-0.3, MembershipShape::Sigmoid) > 0.9);
    assert!(fset.value(0.3, MembershipShape::Sigmoid) < 0.1);
}

#[test]
fn values_stay_in_unit_interval() {
    let rising = MembershipFunction::new(0.0, 200.0, BAND);
    let falling = MembershipFunction::new(0.0, -200.0, BAND);
    for shape in [MembershipShape::Sigmoid, MembershipShape::Trapezoid] {
        for i in -50..=50 {
            let u = i as f64 / 10.0;
            for fset in [&rising, &falling] {
                let v = fset.value(u, shape);
                assert!((0.0..=1.0).contains(&v), "value {} out of range", v);
            }
        }
    }
}

#[test]
fn trapezoid_clamps_outside_support() {
    let fset = MembershipFunction::new(0.0, 2.0, BAND);
    assert_abs_diff_eq!(fset.value(-0.5, MembershipShape::Trapezoid), 0.0);
    assert_abs_diff_eq!(fset.value(0.0, MembershipShape::Trapezoid), 0.5);
    assert_abs_diff_eq!(fset.value(0.5, MembershipShape::Trapezoid), 1.0);
}

#[test]
fn steepness_magnitude_is_clamped_preserving_sign() {
    let band = (0.5, 200.0);
    let fset = MembershipFunction::new(0.0, 1000.0, band);
    assert_abs_diff_eq!(fset.steepness(), 200.0);

    let fset = MembershipFunction::new(0.0, -1000.0, band);
    assert_abs_diff_eq!(fset.steepness(), -200.0);

    let fset = MembershipFunction::new(0.0, -0.1, band);
    assert_abs_diff_eq!(fset.steepness(), -0.5);
}

#[test]
fn add_steepness_clamps_the_result() {
    let band = (0.5, 200.0);
    let mut fset = MembershipFunction::new(0.0, 199.0, band);
    fset.add_steepness(10.0, band);
    assert_abs_diff_eq!(fset.steepness(), 200.0);
}

#[test]
fn guarded_add_rejects_moves_outside_the_band() {
    let band = (0.5, 200.0);
    let mut fset = MembershipFunction::new(0.0, 1.0, band);

    fset.guarded_add_steepness(1000.0, band);
    assert_abs_diff_eq!(fset.steepness(), 1.0);

    // Crossing through zero into the mirrored band is also rejected.
    fset.guarded_add_steepness(-1.2, band);
    assert_abs_diff_eq!(fset.steepness(), 1.0);

    fset.guarded_add_steepness(0.5, band);
    assert_abs_diff_eq!(fset.steepness(), 1.5);
}
