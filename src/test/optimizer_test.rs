use crate::optimizer::{HookeJeevesMinimizer, ParameterSpace, StepState};
use approx::assert_abs_diff_eq;

const BOUNDS: (f64, f64) = (0.00001, 0.01);

#[test]
fn rprop_moves_against_the_gradient_sign() {
    let mut state = StepState::default();
    state.reset(0.001);

    state.grad = 2.5;
    assert_abs_diff_eq!(state.rprop_delta(BOUNDS), -0.001);
    assert_abs_diff_eq!(state.grad, 0.0);
    assert_abs_diff_eq!(state.prev_grad, 2.5);

    state.grad = -1.0;
    // Sign flip: the previous move is undone and the step halves.
    assert_abs_diff_eq!(state.rprop_delta(BOUNDS), 0.001);
    assert_abs_diff_eq!(state.step, 0.0005);
    assert_abs_diff_eq!(state.prev_grad, 0.0);
}

#[test]
fn rprop_grows_the_step_on_sign_agreement() {
    let mut state = StepState::default();
    state.reset(0.001);

    state.grad = -1.0;
    assert_abs_diff_eq!(state.rprop_delta(BOUNDS), 0.001);
    state.grad = -1.0;
    assert_abs_diff_eq!(state.rprop_delta(BOUNDS), 0.0012);
}

#[test]
fn rprop_step_respects_its_bounds() {
    let mut state = StepState::default();
    state.reset(0.009);
    state.grad = 1.0;
    state.rprop_delta(BOUNDS);
    state.grad = 1.0;
    state.rprop_delta(BOUNDS);
    assert_abs_diff_eq!(state.step, 0.01);

    let mut state = StepState::default();
    state.reset(0.000012);
    state.grad = 1.0;
    state.rprop_delta(BOUNDS);
    state.grad = -1.0;
    state.rprop_delta(BOUNDS);
    assert_abs_diff_eq!(state.step, 0.00001);
}

#[test]
fn rprop_rollback_reverses_the_last_move() {
    let mut state = StepState::default();
    state.reset(0.001);
    let mut p = 1.0;

    state.grad = 3.0;
    p += state.rprop_delta(BOUNDS);
    p += state.rprop_rollback();
    assert_abs_diff_eq!(p, 1.0);
}

#[test]
fn zero_gradient_leaves_the_parameter_alone() {
    let mut state = StepState::default();
    state.reset(0.001);
    assert_abs_diff_eq!(state.rprop_delta(BOUNDS), 0.0);
    assert_abs_diff_eq!(state.rprop_rollback(), 0.0);
}

#[test]
fn momentum_accumulates_and_rolls_back() {
    let mut state = StepState::default();
    state.reset(0.0);

    state.grad = 1.0;
    let d1 = state.momentum_delta(0.1, 0.9);
    assert_abs_diff_eq!(d1, -0.1);

    state.grad = 1.0;
    let d2 = state.momentum_delta(0.1, 0.9);
    assert_abs_diff_eq!(d2, -0.19, epsilon = 1e-12);

    assert_abs_diff_eq!(state.momentum_rollback(), 0.19, epsilon = 1e-12);
}

/// Shifted quadratic bowl used to exercise the direct search.
struct Bowl {
    x: Vec<f64>,
    target: Vec<f64>,
}

impl ParameterSpace for Bowl {
    fn parameter_count(&self) -> usize {
        self.x.len()
    }
    fn get(&self, index: usize) -> f64 {
        self.x[index]
    }
    fn set(&mut self, index: usize, value: f64) {
        self.x[index] = value;
    }
    fn evaluate(&mut self) -> f64 {
        self.x
            .iter()
            .zip(self.target.iter())
            .map(|(x, t)| (x - t) * (x - t))
            .sum()
    }
}

#[test]
fn hooke_jeeves_finds_the_minimum_of_a_quadratic() {
    let mut bowl = Bowl {
        x: vec![0.0, 0.0, 0.0],
        target: vec![0.3, -0.2, 0.05],
    };
    let minimizer = HookeJeevesMinimizer::new(100000);
    let y = minimizer.minimize(&mut bowl);
    assert!(y < 1e-10, "final objective {} too large", y);
    for (x, t) in bowl.x.iter().zip(bowl.target.iter()) {
        assert_abs_diff_eq!(x, t, epsilon = 1e-5);
    }
}

#[test]
fn hooke_jeeves_respects_the_iteration_cap() {
    let mut bowl = Bowl {
        x: vec![5.0],
        target: vec![-5.0],
    };
    let minimizer = HookeJeevesMinimizer::new(1);
    let before = bowl.evaluate();
    let y = minimizer.minimize(&mut bowl);
    assert!(y <= before);
}
