use crate::config::{ETA_MINUS, ETA_PLUS};
use serde::{Deserialize, Serialize};

/// Per-parameter training state shared by every trainable quantity
/// (consequence coefficient, membership center, membership steepness).
///
/// For RPROP, `step` is the current adaptive step magnitude; for gradient
/// descent with momentum it holds the last applied increment. `grad` is the
/// gradient accumulated by the current forward/backward pass, `prev_grad`
/// the gradient sign memory of the previous accepted step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    pub grad: f64,
    pub prev_grad: f64,
    pub step: f64,
}

impl StepState {
    /// Resets the state for a fresh training run
    pub fn reset(&mut self, initial_step: f64) {
        self.grad = 0.0;
        self.prev_grad = 0.0;
        self.step = initial_step;
    }

    /// One RPROP update. Consumes the accumulated gradient and returns the
    /// signed increment to add to the parameter. On a gradient sign flip the
    /// returned increment undoes the previous move and the step shrinks.
    pub fn rprop_delta(&mut self, bounds: (f64, f64)) -> f64 {
        if self.grad * self.prev_grad >= 0.0 {
            if self.grad * self.prev_grad > 0.0 {
                self.step = (self.step * ETA_PLUS).min(bounds.1);
            }
            let delta = if self.grad > 0.0 {
                -self.step
            } else if self.grad < 0.0 {
                self.step
            } else {
                0.0
            };
            self.prev_grad = self.grad;
            self.grad = 0.0;
            delta
        } else {
            let undo = if self.prev_grad > 0.0 {
                self.step
            } else {
                -self.step
            };
            self.prev_grad = 0.0;
            self.grad = 0.0;
            self.step = (self.step * ETA_MINUS).max(bounds.0);
            undo
        }
    }

    /// Increment that reverses the last RPROP move, for batch rollback
    pub fn rprop_rollback(&self) -> f64 {
        if self.prev_grad > 0.0 {
            self.step
        } else if self.prev_grad < 0.0 {
            -self.step
        } else {
            0.0
        }
    }

    /// One momentum gradient-descent update; returns the increment to apply
    pub fn momentum_delta(&mut self, alpha: f64, beta: f64) -> f64 {
        self.step = beta * self.step - alpha * self.grad;
        self.grad = 0.0;
        self.step
    }

    /// Increment that reverses the last momentum move
    pub fn momentum_rollback(&self) -> f64 {
        -self.step
    }
}

/// Address of one trainable parameter inside a model.
///
/// The joint fine-tuning pass operates on a flat vector of these instead of
/// on polymorphic parameter objects. `Center::twin` carries the arena index
/// of the paired fuzzy set when coupled centers are enabled, so both centers
/// move together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRef {
    Consequence { rule: usize, coeff: usize },
    Center { set: usize, twin: Option<usize> },
    Steepness { set: usize },
}

/// A function of a flat parameter vector, the seam between the direct-search
/// minimizer and the model it tunes.
pub trait ParameterSpace {
    fn parameter_count(&self) -> usize;
    fn get(&self, index: usize) -> f64;
    fn set(&mut self, index: usize, value: f64);
    /// Objective value at the current parameters; lower is better.
    fn evaluate(&mut self) -> f64;
}

/// Hooke-Jeeves pattern search over a [`ParameterSpace`].
///
/// Coordinate exploration with step `delta`, accepting strict improvements,
/// followed by pattern moves along the accumulated difference vector. The
/// step halves whenever exploration fails; the search stops when the step or
/// the improvement falls below machine precision or the iteration cap is hit.
pub struct HookeJeevesMinimizer {
    pub max_iterations: usize,
}

const INIT_DELTA: f64 = 5e-2;
const REDU: f64 = 0.5;
const MIN_DELTA: f64 = f64::EPSILON;
const MIN_IMPROVEMENT: f64 = f64::EPSILON;

impl HookeJeevesMinimizer {
    pub fn new(max_iterations: usize) -> Self {
        HookeJeevesMinimizer { max_iterations }
    }

    /// Minimizes the objective, leaves the space at the best point found and
    /// returns the corresponding objective value
    pub fn minimize<S: ParameterSpace>(&self, space: &mut S) -> f64 {
        let n = space.parameter_count();
        let mut best_x: Vec<f64> = (0..n).map(|i| space.get(i)).collect();
        let mut best_y = space.evaluate();
        let mut delta = INIT_DELTA;
        let mut iteration = 0usize;

        while delta >= MIN_DELTA && iteration < self.max_iterations {
            let explored_y = Self::explore(space, best_y, delta);
            iteration += 1;

            if explored_y < best_y - MIN_IMPROVEMENT {
                // Pattern moves while the exploration keeps paying off.
                let mut prev_x = best_x.clone();
                best_x = (0..n).map(|i| space.get(i)).collect();
                best_y = explored_y;

                while iteration < self.max_iterations {
                    for i in 0..n {
                        space.set(i, best_x[i] + (best_x[i] - prev_x[i]));
                    }
                    let pattern_y = space.evaluate();
                    let moved_y = Self::explore(space, pattern_y, delta);
                    iteration += 1;

                    if moved_y < best_y - MIN_IMPROVEMENT {
                        prev_x = best_x;
                        best_x = (0..n).map(|i| space.get(i)).collect();
                        best_y = moved_y;
                    } else {
                        for (i, x) in best_x.iter().enumerate() {
                            space.set(i, *x);
                        }
                        break;
                    }
                }
            } else {
                for (i, x) in best_x.iter().enumerate() {
                    space.set(i, *x);
                }
                delta *= REDU;
            }
        }

        for (i, x) in best_x.iter().enumerate() {
            space.set(i, *x);
        }
        best_y
    }

    /// Probes every coordinate at +delta then -delta, keeping each move that
    /// strictly improves the objective; returns the resulting value
    fn explore<S: ParameterSpace>(space: &mut S, mut y: f64, delta: f64) -> f64 {
        for i in 0..space.parameter_count() {
            let base = space.get(i);
            space.set(i, base + delta);
            let y_plus = space.evaluate();
            if y_plus < y {
                y = y_plus;
                continue;
            }
            space.set(i, base - delta);
            let y_minus = space.evaluate();
            if y_minus < y {
                y = y_minus;
            } else {
                space.set(i, base);
            }
        }
        y
    }
}
