use crate::config::MembershipShape;
use crate::membership::MembershipFunction;
use crate::optimizer::StepState;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Premise slots of one rule in one input dimension.
///
/// The slots hold arena indices into the model's membership function store.
/// `lower` points at the rising edge of the fuzzy interval, `upper` at the
/// falling edge; an empty slot means the rule is unbounded on that side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Premise {
    pub lower: Option<usize>,
    pub upper: Option<usize>,
}

/// One Takagi-Sugeno rule: a fuzzy premise over the input space and an
/// affine consequence `c0 + c1*u1 + ... `, truncated to the configured
/// consequence dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    premise: Vec<Premise>,
    coefficients: Array1<f64>,
    pub(crate) coeff_states: Vec<StepState>,
}

impl Rule {
    /// A rule with empty premise slots and zero consequence coefficients
    pub fn new(input_dim: usize, consequence_dim: usize) -> Self {
        Rule {
            premise: vec![Premise::default(); input_dim],
            coefficients: Array1::zeros(consequence_dim),
            coeff_states: vec![StepState::default(); consequence_dim],
        }
    }

    pub fn premise(&self) -> &[Premise] {
        &self.premise
    }

    pub(crate) fn premise_mut(&mut self) -> &mut [Premise] {
        &mut self.premise
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub(crate) fn coefficients_mut(&mut self) -> &mut Array1<f64> {
        &mut self.coefficients
    }

    /// True when any premise slot references the given arena index
    pub fn references_set(&self, set: usize) -> bool {
        self.premise
            .iter()
            .any(|p| p.lower == Some(set) || p.upper == Some(set))
    }

    /// Degree to which the rule fires for input `u`: the product of the
    /// memberships of all occupied slots, `1.0` for the unbounded root rule
    pub fn firing_strength(
        &self,
        u: ArrayView1<f64>,
        arena: &[MembershipFunction],
        shape: MembershipShape,
    ) -> f64 {
        let mut w = 1.0;
        for (dim, p) in self.premise.iter().enumerate() {
            if let Some(i) = p.lower {
                w *= arena[i].value(u[dim], shape);
            }
            if let Some(i) = p.upper {
                w *= arena[i].value(u[dim], shape);
            }
        }
        w
    }

    /// Value of the affine consequence function at `u`
    pub fn consequence_value(&self, u: ArrayView1<f64>) -> f64 {
        let mut f = self.coefficients[0];
        for j in 1..self.coefficients.len() {
            f += self.coefficients[j] * u[j - 1];
        }
        f
    }
}
