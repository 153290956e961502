use crate::config::{
    DELTA_CONS_0, DELTA_CONS_BOUNDS, DELTA_MU_0, DELTA_MU_BOUNDS, DELTA_SIGMA_BOUNDS,
    ErrorNorm, MU_LEFT, MU_RIGHT, MembershipShape, ModelConfig, OptimizerKind,
};
use crate::dataset::Dataset;
use crate::error::{IoError, ModelError};
use crate::membership::MembershipFunction;
use crate::optimizer::{ParamRef, ParameterSpace};
use crate::page_hinkley::{DriftStatus, PageHinkley};
use crate::rule::Rule;
use crate::svd::solve_least_squares;
use log::warn;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Per-pattern evaluation record emitted by [`FuzzyModel::estimate_trace`].
///
/// Inputs, prediction and target are reported in the raw (denormalized)
/// range of the dataset; the residual is the scaled one entering the RMS.
/// `block_end` marks the last pattern of each block of the dataset.
#[derive(Debug, Clone)]
pub struct PatternRecord {
    pub pattern: usize,
    pub inputs: Vec<f64>,
    pub prediction: f64,
    pub target: f64,
    pub residual: f64,
    pub covered: bool,
    pub block_end: bool,
    pub drift: Option<DriftStatus>,
}

/// A Takagi-Sugeno fuzzy model: a flat arena of membership functions and a
/// rule base referencing them by index.
///
/// Models start as a single unbounded rule and grow by [`split`](Self::split),
/// which appends one membership pair and one rule per call, so the invariant
/// `membership_count == 2 * (rule_count - 1)` always holds. Consequences can
/// be fitted in closed form by least squares, and all parameters trained by
/// RPROP or gradient descent with validation-gated rollback.
///
/// # Example
///
/// ```rust
/// use fuzzyreg::{Dataset, FuzzyModel, ModelConfig};
///
/// let config = ModelConfig {
///     consequence_dim: 2,
///     ..Default::default()
/// };
/// let data = Dataset::from_rows(&[
///     vec![0.0, 0.0],
///     vec![1.0, 2.0],
///     vec![2.0, 4.0],
///     vec![3.0, 6.0],
/// ]).unwrap();
///
/// let mut model = FuzzyModel::new(1, &config).unwrap();
/// model.fit_consequences_svd(&data).unwrap();
/// let rms = model.estimate(&data).unwrap();
/// assert!(rms < 1e-8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyModel {
    input_dim: usize,
    consequence_dim: usize,
    sets: Vec<MembershipFunction>,
    rules: Vec<Rule>,
    split_history: Vec<(usize, usize)>,
    worst_rule: Option<usize>,
    config: ModelConfig,
}

impl FuzzyModel {
    /// Creates the initial one-rule model
    ///
    /// # Parameters
    ///
    /// - `input_dim` - Number of input columns
    /// - `config` - Model configuration, validated against `input_dim`
    ///
    /// # Returns
    ///
    /// * `Ok(FuzzyModel)` - A model with a single unbounded rule and zero consequences
    /// * `Err(ModelError::InputValidationError)` - If the configuration is inconsistent
    pub fn new(input_dim: usize, config: &ModelConfig) -> Result<Self, ModelError> {
        config.validate(input_dim)?;
        Ok(FuzzyModel {
            input_dim,
            consequence_dim: config.consequence_dim,
            sets: Vec::new(),
            rules: vec![Rule::new(input_dim, config.consequence_dim)],
            split_history: Vec::new(),
            worst_rule: None,
            config: config.clone(),
        })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn consequence_dim(&self) -> usize {
        self.consequence_dim
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn membership_count(&self) -> usize {
        self.sets.len()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn membership_functions(&self) -> &[MembershipFunction] {
        &self.sets
    }

    /// Splits recorded so far, as `(rule index, input dimension)` pairs
    pub fn split_history(&self) -> &[(usize, usize)] {
        &self.split_history
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Index of the rule with the largest accumulated error, as determined by
    /// the last call to [`worst_rule_index`](Self::worst_rule_index)
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - The stored rule index
    /// * `Err(ModelError::NotFitted)` - If no assessment has been run yet
    pub fn worst_rule(&self) -> Result<usize, ModelError> {
        self.worst_rule.ok_or(ModelError::NotFitted)
    }

    fn band(&self) -> (f64, f64) {
        (self.config.min_steepness, self.config.max_steepness)
    }

    fn check_data(&self, data: &Dataset) -> Result<(), ModelError> {
        if data.input_dim() != self.input_dim {
            return Err(ModelError::InputValidationError(format!(
                "dataset has {} input columns, model expects {}",
                data.input_dim(),
                self.input_dim
            )));
        }
        Ok(())
    }

    /// Model output for one input pattern, the firing-strength weighted mean
    /// of the rule consequences
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` - The prediction
    /// * `Err(ModelError::IncompleteCoverage)` - If the total firing strength is not positive
    /// * `Err(ModelError::InputValidationError)` - If `u` has the wrong length
    pub fn predict(&self, u: ArrayView1<f64>) -> Result<f64, ModelError> {
        if u.len() != self.input_dim {
            return Err(ModelError::InputValidationError(format!(
                "input has length {}, model expects {}",
                u.len(),
                self.input_dim
            )));
        }
        let mut sum_w = 0.0;
        let mut sum_wf = 0.0;
        for rule in &self.rules {
            let w = rule.firing_strength(u, &self.sets, self.config.shape);
            sum_w += w;
            sum_wf += w * rule.consequence_value(u);
        }
        if sum_w <= 0.0 {
            return Err(ModelError::IncompleteCoverage);
        }
        Ok(sum_wf / sum_w)
    }

    /// Refines the model by splitting one rule along one input dimension.
    ///
    /// A new membership pair is created at the midpoint of the rule's current
    /// bounds in that dimension (substituting the normalized domain edges for
    /// absent bounds). The falling function is appended first, then the rising
    /// one, so pairs stay adjacent in the arena. A copy of the split rule is
    /// inserted directly after it: the copy covers the lower half through the
    /// new falling bound, the original keeps its upper bound and receives the
    /// new rising one. Consequences are inherited by both.
    ///
    /// # Returns
    ///
    /// * `Ok(FuzzyModel)` - The refined model with one more rule
    /// * `Err(ModelError::InputValidationError)` - If `rule` or `dim` is out of range
    pub fn split(&self, rule: usize, dim: usize) -> Result<FuzzyModel, ModelError> {
        if rule >= self.rules.len() || dim >= self.input_dim {
            return Err(ModelError::InputValidationError(format!(
                "split target (rule {}, dim {}) out of range ({} rules, {} dims)",
                rule,
                dim,
                self.rules.len(),
                self.input_dim
            )));
        }
        let mut child = self.clone();

        let premise = &child.rules[rule].premise()[dim];
        let left = premise
            .lower
            .map(|i| child.sets[i].center())
            .unwrap_or(MU_LEFT);
        let right = premise
            .upper
            .map(|i| child.sets[i].center())
            .unwrap_or(MU_RIGHT);
        let midpoint = 0.5 * (left + right);
        let diff = right - left;

        let sigma_0 = self.config.sigma_0();
        let mut steepness = sigma_0 / diff;
        if !steepness.is_finite() || steepness > 4.0 * sigma_0 {
            steepness = 4.0 * sigma_0;
        }

        let falling = child.sets.len();
        let rising = falling + 1;
        child
            .sets
            .push(MembershipFunction::new(midpoint, -steepness, self.band()));
        child
            .sets
            .push(MembershipFunction::new(midpoint, steepness, self.band()));

        let mut sibling = child.rules[rule].clone();
        sibling.premise_mut()[dim].upper = Some(falling);
        child.rules[rule].premise_mut()[dim].lower = Some(rising);
        child.rules.insert(rule + 1, sibling);

        child.split_history.push((rule, dim));
        child.worst_rule = None;
        Ok(child)
    }

    /// One-step prediction error over a dataset
    ///
    /// Patterns the rule base does not cover are logged and predicted as 0;
    /// residuals are divided by the dataset's target scale factor when it is
    /// positive.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` - The root mean square residual
    /// * `Err(ModelError::InputValidationError)` - If the dataset does not match the model
    pub fn estimate(&self, data: &Dataset) -> Result<f64, ModelError> {
        self.check_data(data)?;
        let scale = data.target_scale_factor();
        let mut sum = 0.0;
        for p in 0..data.len() {
            let prediction = match self.predict(data.input(p)) {
                Ok(v) => v,
                Err(ModelError::IncompleteCoverage) => {
                    warn!("incomplete coverage for pattern {}, predicting 0", p);
                    0.0
                }
                Err(e) => return Err(e),
            };
            let mut diff = data.target(p) - prediction;
            if scale > 0.0 {
                diff /= scale;
            }
            sum += diff * diff;
        }
        Ok((sum / data.len() as f64).sqrt())
    }

    /// One-step prediction error with per-pattern reporting and optional
    /// drift detection
    ///
    /// Each pattern produces a [`PatternRecord`] with denormalized values
    /// that is handed to `sink`; when a [`PageHinkley`] detector is given,
    /// every scaled residual is fed into it and the resulting status attached
    /// to the record.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` - The root mean square residual, as in [`estimate`](Self::estimate)
    pub fn estimate_trace<F>(
        &self,
        data: &Dataset,
        mut drift: Option<&mut PageHinkley>,
        mut sink: F,
    ) -> Result<f64, ModelError>
    where
        F: FnMut(PatternRecord),
    {
        self.check_data(data)?;
        let scale = data.target_scale_factor();
        let mut sum = 0.0;
        for p in 0..data.len() {
            let u = data.input(p);
            let (prediction, covered) = match self.predict(u) {
                Ok(v) => (v, true),
                Err(ModelError::IncompleteCoverage) => {
                    warn!("incomplete coverage for pattern {}, predicting 0", p);
                    (0.0, false)
                }
                Err(e) => return Err(e),
            };
            let mut residual = data.target(p) - prediction;
            if scale > 0.0 {
                residual /= scale;
            }
            sum += residual * residual;

            let status = drift.as_deref_mut().map(|ph| ph.update(residual));
            sink(PatternRecord {
                pattern: p,
                inputs: (0..u.len()).map(|j| data.denormalize_input(j, u[j])).collect(),
                prediction: data.denormalize_target(prediction),
                target: data.denormalize_target(data.target(p)),
                residual,
                covered,
                block_end: (p + 1) % data.block_size() == 0 || p + 1 == data.len(),
                drift: status,
            });
        }
        Ok((sum / data.len() as f64).sqrt())
    }

    /// Recursive multi-step prediction error over a dataset.
    ///
    /// The last `order` positions of the regressor are treated as lagged
    /// outputs: after the first pattern they are filled with the model's own
    /// previous predictions, shifted one step per pattern, while the leading
    /// positions come from the actual data.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` - The root mean square residual
    /// * `Err(ModelError::InputValidationError)` - If `order` is not in `(0, input_dim)`
    ///   or the dataset does not match the model
    pub fn simulate(&self, data: &Dataset, order: usize) -> Result<f64, ModelError> {
        self.check_data(data)?;
        if order == 0 || order >= self.input_dim {
            return Err(ModelError::InputValidationError(format!(
                "simulation order must be in (0, {}), got {}",
                self.input_dim, order
            )));
        }
        let scale = data.target_scale_factor();
        let n = self.input_dim;
        let mut regressor = data.input(0).to_owned();
        let mut previous = 0.0;
        let mut sum = 0.0;
        for p in 0..data.len() {
            if p > 0 {
                // Age the lagged outputs by one step and insert the newest one.
                for j in ((n - order + 1)..n).rev() {
                    regressor[j] = regressor[j - 1];
                }
                regressor[n - order] = previous;
                let u = data.input(p);
                for j in 0..(n - order) {
                    regressor[j] = u[j];
                }
            }
            let prediction = match self.predict(regressor.view()) {
                Ok(v) => v,
                Err(ModelError::IncompleteCoverage) => {
                    warn!("incomplete coverage for pattern {}, predicting 0", p);
                    0.0
                }
                Err(e) => return Err(e),
            };
            previous = prediction;
            let mut diff = data.target(p) - prediction;
            if scale > 0.0 {
                diff /= scale;
            }
            sum += diff * diff;
        }
        Ok((sum / data.len() as f64).sqrt())
    }

    /// Coefficient of determination on a dataset, `1 - var(residual) / var(y)`
    ///
    /// Returns `-f64::MAX` with a warning when the target variance is
    /// degenerate; uncovered patterns are predicted as 0.
    pub fn r_squared(&self, data: &Dataset) -> Result<f64, ModelError> {
        self.check_data(data)?;
        let var_y = data.target_variance();
        if var_y < 10.0 * f64::MIN_POSITIVE {
            warn!("target variance is degenerate, R2 undefined");
            return Ok(-f64::MAX);
        }
        let n = data.len() as f64;
        let mut residuals = Vec::with_capacity(data.len());
        for p in 0..data.len() {
            let prediction = match self.predict(data.input(p)) {
                Ok(v) => v,
                Err(ModelError::IncompleteCoverage) => {
                    warn!("incomplete coverage for pattern {}, predicting 0", p);
                    0.0
                }
                Err(e) => return Err(e),
            };
            residuals.push(data.target(p) - prediction);
        }
        let mean = residuals.iter().sum::<f64>() / n;
        let var_r = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        Ok(1.0 - var_r / var_y)
    }

    /// Finds and stores the rule accumulating the largest firing-strength
    /// weighted error over the dataset
    ///
    /// The per-pattern error term follows the configured norm: `|r|` for L1,
    /// `r^2` for L2 and `sign(r) * r^2` for L3.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Index of the worst rule
    /// * `Err(ModelError::IncompleteCoverage)` - If any pattern is uncovered
    pub fn worst_rule_index(&mut self, data: &Dataset) -> Result<usize, ModelError> {
        self.check_data(data)?;
        let mut scores = vec![0.0_f64; self.rules.len()];
        let mut weights = vec![0.0_f64; self.rules.len()];
        for p in 0..data.len() {
            let u = data.input(p);
            let mut sum_w = 0.0;
            let mut sum_wf = 0.0;
            for (r, rule) in self.rules.iter().enumerate() {
                let w = rule.firing_strength(u, &self.sets, self.config.shape);
                weights[r] = w;
                sum_w += w;
                sum_wf += w * rule.consequence_value(u);
            }
            if sum_w <= 0.0 {
                return Err(ModelError::IncompleteCoverage);
            }
            let diff = data.target(p) - sum_wf / sum_w;
            let error = match self.config.norm {
                ErrorNorm::L1 => diff.abs(),
                ErrorNorm::L2 => diff * diff,
                ErrorNorm::L3 => diff.signum() * diff * diff,
            };
            for (score, w) in scores.iter_mut().zip(weights.iter()) {
                *score += error * w;
            }
        }
        let mut worst = 0;
        for (r, score) in scores.iter().enumerate() {
            if *score > scores[worst] {
                worst = r;
            }
        }
        self.worst_rule = Some(worst);
        Ok(worst)
    }

    /// Fits all consequence coefficients in closed form by linear least squares.
    ///
    /// Each pattern contributes one equation: the normalized firing strengths
    /// times the (truncated) affine regressors of every rule, stacked into an
    /// `n_patterns x (rule_count * consequence_dim)` design matrix solved via
    /// the singular value decomposition.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Coefficients updated in place
    /// * `Err(ModelError::SvdUnderdetermined)` - If there are fewer patterns than unknowns
    /// * `Err(ModelError::IncompleteCoverage)` - If any pattern is uncovered
    pub fn fit_consequences_svd(&mut self, data: &Dataset) -> Result<(), ModelError> {
        self.check_data(data)?;
        let cdim = self.consequence_dim;
        let unknowns = self.rules.len() * cdim;
        if data.len() < unknowns {
            return Err(ModelError::SvdUnderdetermined {
                rows: data.len(),
                cols: unknowns,
            });
        }

        let mut design = Array2::<f64>::zeros((data.len(), unknowns));
        let mut weights = vec![0.0_f64; self.rules.len()];
        for p in 0..data.len() {
            let u = data.input(p);
            let mut sum_w = 0.0;
            for (r, rule) in self.rules.iter().enumerate() {
                let w = rule.firing_strength(u, &self.sets, self.config.shape);
                weights[r] = w;
                sum_w += w;
            }
            if sum_w <= 0.0 {
                return Err(ModelError::IncompleteCoverage);
            }
            for (r, w) in weights.iter().enumerate() {
                let wn = w / sum_w;
                design[[p, r * cdim]] = wn;
                for j in 1..cdim {
                    design[[p, r * cdim + j]] = wn * u[j - 1];
                }
            }
        }

        let solution = solve_least_squares(&design, data.targets())?;
        for (r, rule) in self.rules.iter_mut().enumerate() {
            for j in 0..cdim {
                rule.coefficients_mut()[j] = solution[r * cdim + j];
            }
        }
        Ok(())
    }

    /// Sets all consequence coefficients to zero
    pub fn reset_consequences(&mut self) {
        for rule in &mut self.rules {
            rule.coefficients_mut().fill(0.0);
        }
    }

    /// Resets all per-parameter training state for a fresh run
    pub fn init_training(&mut self) {
        let rprop = self.config.optimizer == OptimizerKind::Rprop;
        let cons_0 = if rprop { DELTA_CONS_0 } else { 0.0 };
        let mu_0 = if rprop { DELTA_MU_0 } else { 0.0 };
        let sigma_0 = if rprop { self.config.delta_sigma_0() } else { 0.0 };
        for rule in &mut self.rules {
            for state in &mut rule.coeff_states {
                state.reset(cons_0);
            }
        }
        for set in &mut self.sets {
            set.center_state.reset(mu_0);
            set.steepness_state.reset(sigma_0);
        }
    }

    /// Forward pass plus gradient accumulation over the whole dataset.
    /// Returns the square root of the summed squared residuals.
    fn accumulate_gradients(&mut self, data: &Dataset, with_cons: bool) -> Result<f64, ModelError> {
        let shape = self.config.shape;
        let norm = self.config.norm;
        let local = self.config.local_cons_exponent;
        let n_rules = self.rules.len();
        let n_sets = self.sets.len();

        let mut weights = vec![0.0_f64; n_rules];
        let mut cons_values = vec![0.0_f64; n_rules];
        let mut set_factors = vec![0.0_f64; n_sets];
        let mut set_edges = vec![0.0_f64; n_sets];
        let mut sum_sq = 0.0;

        for p in 0..data.len() {
            let u = data.input(p);
            let mut sum_w = 0.0;
            let mut sum_wf = 0.0;
            for (r, rule) in self.rules.iter().enumerate() {
                let w = rule.firing_strength(u, &self.sets, shape);
                let f = rule.consequence_value(u);
                weights[r] = w;
                cons_values[r] = f;
                sum_w += w;
                sum_wf += w * f;
            }
            if sum_w <= 0.0 {
                return Err(ModelError::IncompleteCoverage);
            }
            let prediction = sum_wf / sum_w;
            let diff = data.target(p) - prediction;
            sum_sq += diff * diff;

            let factor = match norm {
                ErrorNorm::L1 => diff.signum() / sum_w,
                ErrorNorm::L2 => diff / sum_w,
                ErrorNorm::L3 => diff.signum() * diff * diff / sum_w,
            };

            if with_cons {
                let mut factor_c = factor;
                for _ in 0..local {
                    factor_c /= sum_w;
                }
                for (r, rule) in self.rules.iter_mut().enumerate() {
                    let mut factor_r = -factor_c * weights[r];
                    for _ in 0..local {
                        factor_r *= weights[r];
                    }
                    rule.coeff_states[0].grad += factor_r;
                    for j in 1..self.consequence_dim {
                        rule.coeff_states[j].grad += factor_r * u[j - 1];
                    }
                }
            }

            if self.config.update_premise {
                for k in 0..n_sets {
                    set_factors[k] = 0.0;
                    set_edges[k] = 0.0;
                    let mut dim = None;
                    let mut sum_w_d = 0.0;
                    let mut sum_fw_d = 0.0;
                    for (r, rule) in self.rules.iter().enumerate() {
                        for (d, slot) in rule.premise().iter().enumerate() {
                            if slot.lower == Some(k) || slot.upper == Some(k) {
                                dim = Some(d);
                                sum_w_d += weights[r];
                                sum_fw_d += weights[r] * cons_values[r];
                                break;
                            }
                        }
                    }
                    let Some(d) = dim else { continue };

                    let value = self.sets[k].value(u[d], shape);
                    let edge = match shape {
                        MembershipShape::Sigmoid => 1.0 - value,
                        MembershipShape::Trapezoid => {
                            if value > 0.0 && value < 1.0 {
                                1.0 / value
                            } else {
                                continue;
                            }
                        }
                    };
                    let factor_s = factor * (prediction * sum_w_d - sum_fw_d);
                    set_factors[k] = factor_s;
                    set_edges[k] = edge;

                    let center = self.sets[k].center();
                    let sigma = self.sets[k].steepness();
                    self.sets[k].steepness_state.grad += factor_s * edge * (u[d] - center);
                    if !self.config.adjacent_equal_centers {
                        self.sets[k].center_state.grad += factor_s * edge * (-sigma);
                    }
                }

                if self.config.adjacent_equal_centers {
                    // Pairs created by the same split are adjacent in the arena
                    // and share a center; both receive the summed gradient.
                    for k in (0..n_sets).step_by(2) {
                        let a = k;
                        let b = k + 1;
                        if self.sets[a].center() == self.sets[b].center() {
                            let shared = set_factors[a] * set_edges[a] * (-self.sets[a].steepness())
                                + set_factors[b] * set_edges[b] * (-self.sets[b].steepness());
                            self.sets[a].center_state.grad += shared;
                            self.sets[b].center_state.grad += shared;
                        } else {
                            self.sets[a].center_state.grad +=
                                set_factors[a] * set_edges[a] * (-self.sets[a].steepness());
                            self.sets[b].center_state.grad +=
                                set_factors[b] * set_edges[b] * (-self.sets[b].steepness());
                        }
                    }
                }
            }
        }
        Ok(sum_sq.sqrt())
    }

    /// One training step with the configured optimizer
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` - Square root of the summed squared training residuals
    /// * `Err(ModelError::IncompleteCoverage)` - If any pattern is uncovered
    pub fn step(&mut self, data: &Dataset) -> Result<f64, ModelError> {
        if self.config.svd_consequence_fit {
            match self.fit_consequences_svd(data) {
                Ok(()) => {}
                Err(ModelError::SvdUnderdetermined { rows, cols }) => {
                    warn!(
                        "skipping consequence fit: {} patterns for {} unknowns",
                        rows, cols
                    );
                }
                Err(e) => return Err(e),
            }
        }
        let fitness = self.accumulate_gradients(data, !self.config.svd_consequence_fit)?;
        match self.config.optimizer {
            OptimizerKind::Rprop => self.apply_rprop(),
            OptimizerKind::GradientDescent => self.apply_momentum(),
        }
        Ok(fitness)
    }

    fn apply_rprop(&mut self) {
        let band = self.band();
        if !self.config.svd_consequence_fit {
            for rule in &mut self.rules {
                for j in 0..self.consequence_dim {
                    let delta = rule.coeff_states[j].rprop_delta(DELTA_CONS_BOUNDS);
                    rule.coefficients_mut()[j] += delta;
                }
            }
        }
        if self.config.update_premise {
            for set in &mut self.sets {
                let delta_mu = set.center_state.rprop_delta(DELTA_MU_BOUNDS);
                set.add_center(delta_mu);
                let delta_sigma = set.steepness_state.rprop_delta(DELTA_SIGMA_BOUNDS);
                set.add_steepness(delta_sigma, band);
            }
        }
    }

    fn apply_momentum(&mut self) {
        let band = self.band();
        let alpha = self.config.alpha;
        let beta = self.config.beta;
        if !self.config.svd_consequence_fit {
            for rule in &mut self.rules {
                for j in 0..self.consequence_dim {
                    let delta = rule.coeff_states[j].momentum_delta(alpha, beta);
                    rule.coefficients_mut()[j] += delta;
                }
            }
        }
        if self.config.update_premise {
            for set in &mut self.sets {
                let delta_mu = set.center_state.momentum_delta(alpha, beta);
                set.add_center(delta_mu);
                // Steepness reacts weakly to the error surface, so it gets a
                // larger learning rate.
                let delta_sigma = set.steepness_state.momentum_delta(20.0 * alpha, beta);
                set.add_steepness(delta_sigma, band);
            }
        }
    }

    /// Reverses the parameter changes of the last training step
    pub fn rollback_step(&mut self) {
        let band = self.band();
        let rprop = self.config.optimizer == OptimizerKind::Rprop;
        for rule in &mut self.rules {
            for j in 0..self.consequence_dim {
                let delta = if rprop {
                    rule.coeff_states[j].rprop_rollback()
                } else {
                    rule.coeff_states[j].momentum_rollback()
                };
                rule.coefficients_mut()[j] += delta;
            }
        }
        for set in &mut self.sets {
            let (delta_mu, delta_sigma) = if rprop {
                (
                    set.center_state.rprop_rollback(),
                    set.steepness_state.rprop_rollback(),
                )
            } else {
                (
                    set.center_state.momentum_rollback(),
                    set.steepness_state.momentum_rollback(),
                )
            };
            set.add_center(delta_mu);
            set.add_steepness(delta_sigma, band);
        }
    }

    /// Trains the model with validation-gated batch acceptance.
    ///
    /// Steps run in batches of `steps_per_validation`. Before `min_iterations`
    /// every batch is accepted; afterwards a batch is kept only when both the
    /// summed training fitness and the summed validation RMS improved on the
    /// previous batch, otherwise the last step is rolled back and training
    /// stops. A coverage failure inside a batch also rolls back and stops.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` - The validation RMS after the last accepted step
    ///   (`f64::INFINITY` when no batch passed the acceptance test)
    pub fn train(
        &mut self,
        train: &Dataset,
        valid: &Dataset,
        min_iterations: usize,
        max_iterations: usize,
    ) -> Result<f64, ModelError> {
        self.check_data(train)?;
        self.check_data(valid)?;
        self.init_training();

        let mut sum_train = f64::INFINITY;
        let mut sum_valid = f64::INFINITY;
        let mut accepted_rms = f64::INFINITY;
        let mut iteration = 0usize;

        while iteration < max_iterations {
            let mut new_train = 0.0;
            let mut new_valid = 0.0;
            let mut last_rms = f64::INFINITY;
            let mut aborted = false;

            for _ in 0..self.config.steps_per_validation {
                iteration += 1;
                match self.step(train) {
                    Ok(fitness) => {
                        new_train += fitness;
                        last_rms = self.estimate(valid)?;
                        new_valid += last_rms;
                    }
                    Err(ModelError::IncompleteCoverage) => {
                        warn!("coverage lost during training, rolling back");
                        self.rollback_step();
                        aborted = true;
                        break;
                    }
                    Err(e) => return Err(e),
                }
                if iteration >= max_iterations {
                    break;
                }
            }
            if aborted {
                break;
            }

            if iteration <= min_iterations {
                sum_train = new_train;
                sum_valid = new_valid;
                accepted_rms = last_rms;
                continue;
            }
            if new_train < sum_train && new_valid < sum_valid {
                sum_train = new_train;
                sum_valid = new_valid;
                accepted_rms = last_rms;
            } else {
                self.rollback_step();
                break;
            }
        }
        Ok(accepted_rms)
    }

    /// Flat parameter vector for whole-model fine-tuning: all consequence
    /// coefficients, then one center per fuzzy set (or per coupled pair), then
    /// all steepness values
    pub fn tuning_parameters(&self) -> Vec<ParamRef> {
        let mut params = Vec::new();
        for rule in 0..self.rules.len() {
            for coeff in 0..self.consequence_dim {
                params.push(ParamRef::Consequence { rule, coeff });
            }
        }
        let mut k = 0;
        while k < self.sets.len() {
            if self.config.adjacent_equal_centers
                && k % 2 == 0
                && k + 1 < self.sets.len()
                && self.sets[k].center() == self.sets[k + 1].center()
            {
                params.push(ParamRef::Center {
                    set: k,
                    twin: Some(k + 1),
                });
                k += 2;
            } else {
                params.push(ParamRef::Center { set: k, twin: None });
                k += 1;
            }
        }
        for set in 0..self.sets.len() {
            params.push(ParamRef::Steepness { set });
        }
        params
    }

    /// Current value of one tunable parameter
    pub fn parameter_value(&self, param: ParamRef) -> f64 {
        match param {
            ParamRef::Consequence { rule, coeff } => self.rules[rule].coefficients()[coeff],
            ParamRef::Center { set, .. } => self.sets[set].center(),
            ParamRef::Steepness { set } => self.sets[set].steepness(),
        }
    }

    /// Sets one tunable parameter. Coupled centers move together; a steepness
    /// value outside the sign-preserving band is left unchanged.
    pub fn set_parameter(&mut self, param: ParamRef, value: f64) {
        match param {
            ParamRef::Consequence { rule, coeff } => {
                self.rules[rule].coefficients_mut()[coeff] = value;
            }
            ParamRef::Center { set, twin } => {
                self.sets[set].set_center(value);
                if let Some(t) = twin {
                    self.sets[t].set_center(value);
                }
            }
            ParamRef::Steepness { set } => {
                let band = self.band();
                let current = self.sets[set].steepness();
                self.sets[set].guarded_add_steepness(value - current, band);
            }
        }
    }

    /// Serializes the model to a JSON string
    pub fn to_json(&self) -> Result<String, IoError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restores a model from its JSON representation
    pub fn from_json(json: &str) -> Result<Self, IoError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the model as JSON to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IoError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a model back from a JSON file written by [`save`](Self::save)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let reader = IoError::load_in_buf_reader(path)?;
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Objective adapter that lets a direct-search minimizer tune a model
/// against a fixed dataset.
///
/// The objective is the simulation RMS when the configuration carries a
/// positive `simulation_order`, otherwise the one-step estimation RMS;
/// evaluation failures count as `f64::MAX`.
pub struct ModelTuning<'a> {
    model: &'a mut FuzzyModel,
    data: &'a Dataset,
    params: Vec<ParamRef>,
}

impl<'a> ModelTuning<'a> {
    pub fn new(model: &'a mut FuzzyModel, data: &'a Dataset) -> Self {
        let params = model.tuning_parameters();
        ModelTuning {
            model,
            data,
            params,
        }
    }
}

impl ParameterSpace for ModelTuning<'_> {
    fn parameter_count(&self) -> usize {
        self.params.len()
    }

    fn get(&self, index: usize) -> f64 {
        self.model.parameter_value(self.params[index])
    }

    fn set(&mut self, index: usize, value: f64) {
        self.model.set_parameter(self.params[index], value);
    }

    fn evaluate(&mut self) -> f64 {
        let order = self.model.config().simulation_order;
        let result = if order > 0 {
            self.model.simulate(self.data, order)
        } else {
            self.model.estimate(self.data)
        };
        result.unwrap_or(f64::MAX)
    }
}

impl fmt::Display for FuzzyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "fuzzy model: {} rules, {} inputs, consequence dim {}, {} fuzzy sets",
            self.rules.len(),
            self.input_dim,
            self.consequence_dim,
            self.sets.len()
        )?;
        if let Some(w) = self.worst_rule {
            writeln!(f, "worst rule: R{}", w + 1)?;
        }
        if !self.split_history.is_empty() {
            write!(f, "splits:")?;
            for (rule, dim) in &self.split_history {
                write!(f, " (R{}, U{})", rule + 1, dim + 1)?;
            }
            writeln!(f)?;
        }
        for (i, set) in self.sets.iter().enumerate() {
            writeln!(
                f,
                "F{}: [{:.6}, {:.6}]",
                i + 1,
                set.center(),
                set.steepness()
            )?;
        }
        for (r, rule) in self.rules.iter().enumerate() {
            write!(f, "R{}: if", r + 1)?;
            let mut first = true;
            for (dim, slot) in rule.premise().iter().enumerate() {
                for index in [slot.lower, slot.upper].into_iter().flatten() {
                    if !first {
                        write!(f, " and")?;
                    }
                    first = false;
                    write!(
                        f,
                        " U{} is F{} [{:.6}, {:.6}]",
                        dim + 1,
                        index + 1,
                        self.sets[index].center(),
                        self.sets[index].steepness()
                    )?;
                }
            }
            if first {
                write!(f, " always")?;
            }
            write!(f, " then {:.6}", rule.coefficients()[0])?;
            for j in 1..self.consequence_dim {
                write!(f, " + {:.6}*u{}", rule.coefficients()[j], j)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
