use crate::config::MembershipShape;
use crate::optimizer::StepState;
use serde::{Deserialize, Serialize};

/// One membership function: a center `mu` and a signed steepness `sigma`.
///
/// Positive steepness gives a rising edge, negative steepness a falling edge;
/// two functions of opposite sign over the same dimension describe a fuzzy
/// interval. The steepness magnitude is always kept inside a configured band,
/// preserving its sign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipFunction {
    center: f64,
    steepness: f64,
    pub(crate) center_state: StepState,
    pub(crate) steepness_state: StepState,
}

impl MembershipFunction {
    /// Creates a membership function, clamping the steepness into `band`
    pub fn new(center: f64, steepness: f64, band: (f64, f64)) -> Self {
        let mut fset = MembershipFunction {
            center,
            steepness: 0.0,
            center_state: StepState::default(),
            steepness_state: StepState::default(),
        };
        fset.set_steepness(steepness, band);
        fset
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn steepness(&self) -> f64 {
        self.steepness
    }

    pub fn set_center(&mut self, center: f64) {
        self.center = center;
    }

    pub fn add_center(&mut self, delta: f64) {
        self.center += delta;
    }

    /// Sets the steepness, clamping its magnitude into `band` and keeping the sign
    pub fn set_steepness(&mut self, steepness: f64, band: (f64, f64)) {
        let (min_s, max_s) = band;
        self.steepness = if steepness >= 0.0 {
            steepness.clamp(min_s, max_s)
        } else {
            steepness.clamp(-max_s, -min_s)
        };
    }

    /// Adds to the steepness, then clamps as in [`set_steepness`](Self::set_steepness)
    pub fn add_steepness(&mut self, delta: f64, band: (f64, f64)) {
        self.set_steepness(self.steepness + delta, band);
    }

    /// Adds to the steepness only when the result stays inside the
    /// sign-preserving band; used by the joint fine-tuning pass
    pub fn guarded_add_steepness(&mut self, delta: f64, band: (f64, f64)) {
        let (min_s, max_s) = band;
        let candidate = self.steepness + delta;
        if (candidate >= min_s && candidate <= max_s)
            || (candidate >= -max_s && candidate <= -min_s)
        {
            self.steepness = candidate;
        }
    }

    /// Membership degree of `u`, always in `[0, 1]`
    pub fn value(&self, u: f64, shape: MembershipShape) -> f64 {
        match shape {
            MembershipShape::Sigmoid => {
                1.0 / (1.0 + (-self.steepness * (u - self.center)).exp())
            }
            MembershipShape::Trapezoid => {
                (0.5 + self.steepness * (u - self.center)).clamp(0.0, 1.0)
            }
        }
    }
}
