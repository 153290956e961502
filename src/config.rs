use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Training algorithm used for the premise and consequence parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    /// Resilient backpropagation with per-parameter adaptive step sizes
    Rprop,
    /// Plain gradient descent with momentum
    GradientDescent,
}

/// Error norm applied to residuals during training and rule assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorNorm {
    /// Absolute error
    L1,
    /// Squared error
    L2,
    /// Signed cubic-like error, emphasizes large residuals
    L3,
}

/// Shape of all membership functions in a model, chosen at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipShape {
    /// Logistic sigmoid `1 / (1 + exp(-sigma * (u - mu)))`
    Sigmoid,
    /// Clamped linear ramp `clamp(0.5 + sigma * (u - mu), 0, 1)`
    Trapezoid,
}

/// Whole-model fine-tuning pass applied after the structure search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JointTuning {
    None,
    /// Hooke-Jeeves direct search over all model parameters
    HookeJeeves,
}

/// Left substitute center when a rule has no lower bound in a dimension.
/// Inputs are assumed normalized roughly into `[-0.5, 0.5]`.
pub const MU_LEFT: f64 = -0.5;
/// Right substitute center when a rule has no upper bound in a dimension.
pub const MU_RIGHT: f64 = 0.5;
/// Initial RPROP step size for membership centers.
pub const DELTA_MU_0: f64 = 0.001;
/// Initial RPROP step size for consequence coefficients.
pub const DELTA_CONS_0: f64 = 0.001;
/// RPROP step bounds for membership centers.
pub const DELTA_MU_BOUNDS: (f64, f64) = (0.00001, 0.01);
/// RPROP step bounds for consequence coefficients.
pub const DELTA_CONS_BOUNDS: (f64, f64) = (0.00001, 0.01);
/// RPROP step bounds for membership steepness.
pub const DELTA_SIGMA_BOUNDS: (f64, f64) = (0.001, 1.0);
/// RPROP step growth factor on gradient sign agreement.
pub const ETA_PLUS: f64 = 1.2;
/// RPROP step shrink factor on gradient sign disagreement.
pub const ETA_MINUS: f64 = 0.5;

/// Immutable configuration for model construction, training and structure search.
///
/// One `ModelConfig` value is passed explicitly into [`FuzzyModel::new`](crate::FuzzyModel::new)
/// and [`StructureSearch`](crate::StructureSearch); there is no global mutable state.
///
/// # Fields
///
/// - `optimizer` - Training algorithm for rule parameters
/// - `consequence_dim` - Number of consequence coefficients per rule, `1` (constant)
///   up to `1 + input_dim` (full affine form)
/// - `norm` - Error norm for gradients and worst-rule assessment
/// - `local_cons_exponent` - Extra `1 / sum(w)` powers applied to the consequence
///   gradient factor, localizing consequence updates
/// - `shortcut` - Split only the currently worst rule during the structure search
/// - `reset_consequences` - Zero the consequence coefficients of each split candidate
///   before training it
/// - `update_premise` - Train membership centers and steepness (consequences are
///   always trained)
/// - `min_rules` / `max_rules` - Bounds on the rule count of the structure search
/// - `adjacent_equal_centers` - Keep the centers of each fuzzy-set pair created by
///   the same split coupled
/// - `steps_per_validation` - Training steps per validation batch
/// - `svd_consequence_fit` - Refit consequences by least squares each training step
///   instead of the gradient update
/// - `min_iterations` / `max_iterations` - Training iteration bounds per candidate
/// - `min_steepness` / `max_steepness` - Magnitude band for membership steepness
/// - `r2_improvement` - Minimum epoch-over-global R² gain to continue the search
/// - `optimize_epoch_best` - Extra training iterations for each epoch winner
/// - `optimize_global_best` - Extra training iterations for the final best model
/// - `alpha` / `beta` - Gradient descent learning rate and momentum
/// - `shape` - Membership function shape
/// - `joint_tuning` - Optional whole-model fine-tuning pass
/// - `max_joint_iterations` - Iteration cap for the joint tuning pass
/// - `simulation_order` - Recurrent lag count; when positive, joint tuning
///   minimizes the simulation error instead of the estimation error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub optimizer: OptimizerKind,
    pub consequence_dim: usize,
    pub norm: ErrorNorm,
    pub local_cons_exponent: u32,
    pub shortcut: bool,
    pub reset_consequences: bool,
    pub update_premise: bool,
    pub min_rules: usize,
    pub max_rules: usize,
    pub adjacent_equal_centers: bool,
    pub steps_per_validation: usize,
    pub svd_consequence_fit: bool,
    pub min_iterations: usize,
    pub max_iterations: usize,
    pub min_steepness: f64,
    pub max_steepness: f64,
    pub r2_improvement: f64,
    pub optimize_epoch_best: usize,
    pub optimize_global_best: usize,
    pub alpha: f64,
    pub beta: f64,
    pub shape: MembershipShape,
    pub joint_tuning: JointTuning,
    pub max_joint_iterations: usize,
    pub simulation_order: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            optimizer: OptimizerKind::Rprop,
            consequence_dim: 1,
            norm: ErrorNorm::L2,
            local_cons_exponent: 0,
            shortcut: false,
            reset_consequences: false,
            update_premise: true,
            min_rules: 2,
            max_rules: 9,
            adjacent_equal_centers: false,
            steps_per_validation: 4,
            svd_consequence_fit: false,
            min_iterations: 12,
            max_iterations: 250,
            min_steepness: f64::MIN_POSITIVE,
            max_steepness: 200.0,
            r2_improvement: 0.0,
            optimize_epoch_best: 0,
            optimize_global_best: 10000,
            alpha: 0.001,
            beta: 0.9,
            shape: MembershipShape::Sigmoid,
            joint_tuning: JointTuning::None,
            max_joint_iterations: 100000,
            simulation_order: 0,
        }
    }
}

impl ModelConfig {
    /// Initial steepness magnitude for newly created membership functions,
    /// before division by the interval width
    pub fn sigma_0(&self) -> f64 {
        match self.shape {
            MembershipShape::Sigmoid => 10.0,
            MembershipShape::Trapezoid => 2.0,
        }
    }

    /// Initial RPROP step size for membership steepness
    pub fn delta_sigma_0(&self) -> f64 {
        match self.shape {
            MembershipShape::Sigmoid => 0.1,
            MembershipShape::Trapezoid => 0.02,
        }
    }

    /// Validates the configuration against the input dimension of the data
    ///
    /// # Parameters
    ///
    /// - `input_dim` - Number of input columns the model will be built for
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the configuration is consistent
    /// * `Err(ModelError::InputValidationError)` - If any bound is violated
    pub fn validate(&self, input_dim: usize) -> Result<(), ModelError> {
        if input_dim == 0 {
            return Err(ModelError::InputValidationError(
                "input dimension must be at least 1".to_string(),
            ));
        }
        if self.consequence_dim < 1 || self.consequence_dim > input_dim + 1 {
            return Err(ModelError::InputValidationError(format!(
                "consequence dimension must be in [1, {}], got {}",
                input_dim + 1,
                self.consequence_dim
            )));
        }
        if self.min_rules < 1 || self.max_rules < self.min_rules {
            return Err(ModelError::InputValidationError(format!(
                "rule bounds must satisfy 1 <= min_rules <= max_rules, got [{}, {}]",
                self.min_rules, self.max_rules
            )));
        }
        if self.steps_per_validation == 0 {
            return Err(ModelError::InputValidationError(
                "steps_per_validation must be positive".to_string(),
            ));
        }
        if self.max_iterations < self.min_iterations {
            return Err(ModelError::InputValidationError(format!(
                "iteration bounds must satisfy min <= max, got [{}, {}]",
                self.min_iterations, self.max_iterations
            )));
        }
        if !(self.min_steepness > 0.0) || self.max_steepness < self.min_steepness {
            return Err(ModelError::InputValidationError(
                "steepness band must satisfy 0 < min_steepness <= max_steepness".to_string(),
            ));
        }
        if self.simulation_order >= input_dim.max(1) && self.simulation_order != 0 {
            return Err(ModelError::InputValidationError(format!(
                "simulation order must be less than the input dimension {}, got {}",
                input_dim, self.simulation_order
            )));
        }
        Ok(())
    }
}
