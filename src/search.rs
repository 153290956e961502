use crate::config::{JointTuning, ModelConfig};
use crate::dataset::Dataset;
use crate::error::ModelError;
use crate::model::{FuzzyModel, ModelTuning};
use crate::optimizer::HookeJeevesMinimizer;
use log::{debug, info, warn};
use rayon::prelude::*;

/// Validation results of one epoch of the structure search
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub rules: usize,
    pub validation_rms: f64,
    pub r_squared: f64,
}

/// Final result of a structure search
///
/// # Fields
///
/// - `model` - The best model found across all epochs
/// - `validation_rms` - Its one-step RMS on the validation data
/// - `r_squared` - Its coefficient of determination on the validation data
/// - `epochs` - Per-epoch progress, one entry per rule count visited
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub model: FuzzyModel,
    pub validation_rms: f64,
    pub r_squared: f64,
    pub epochs: Vec<EpochReport>,
}

/// Greedy structure search for Takagi-Sugeno models.
///
/// Starting from the single-rule model with least-squares consequences, each
/// epoch tries to split every rule along every input dimension (or only the
/// worst rule when the shortcut is enabled), trains each candidate and keeps
/// the one with the lowest validation RMS. The search continues while the
/// epoch R² improves on the previous one by at least the configured margin
/// and the rule bounds allow it; the global best is the epoch model with the
/// lowest validation RMS seen, and is optionally fine-tuned at the end.
///
/// # Example
///
/// ```rust,no_run
/// use fuzzyreg::{Dataset, ModelConfig, StructureSearch};
///
/// let config = ModelConfig { consequence_dim: 2, ..Default::default() };
/// let train = Dataset::from_rows(&[/* ... */]).unwrap();
/// let valid = train.clone();
/// let outcome = StructureSearch::new(config).run(&train, &valid).unwrap();
/// println!("{}", outcome.model);
/// ```
pub struct StructureSearch {
    config: ModelConfig,
}

impl StructureSearch {
    pub fn new(config: ModelConfig) -> Self {
        StructureSearch { config }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Runs the search
    ///
    /// # Parameters
    ///
    /// - `train` - Data used for candidate training and consequence fitting
    /// - `valid` - Held-out data used for candidate selection and acceptance
    ///
    /// # Returns
    ///
    /// * `Ok(SearchOutcome)` - The best model and the epoch history
    /// * `Err(ModelError)` - On invalid configuration or data, or when the
    ///   initial rule base cannot cover the training data
    pub fn run(&self, train: &Dataset, valid: &Dataset) -> Result<SearchOutcome, ModelError> {
        self.config.validate(train.input_dim())?;
        if train.input_dim() != valid.input_dim() {
            return Err(ModelError::InputValidationError(format!(
                "training data has {} input columns, validation data {}",
                train.input_dim(),
                valid.input_dim()
            )));
        }

        // Epoch 1: the root rule with closed-form consequences.
        let mut global_model = FuzzyModel::new(train.input_dim(), &self.config)?;
        match global_model.fit_consequences_svd(train) {
            Ok(()) => {}
            Err(ModelError::SvdUnderdetermined { rows, cols }) => {
                warn!(
                    "skipping consequence fit: {} patterns for {} unknowns",
                    rows, cols
                );
            }
            Err(e) => return Err(e),
        }
        let mut best_model = global_model.clone();
        let mut best_rms = global_model.estimate(valid)?;
        let mut best_r2 = global_model.r_squared(valid)?;
        let mut global_r2 = best_r2;
        let mut epochs = vec![EpochReport {
            rules: 1,
            validation_rms: best_rms,
            r_squared: best_r2,
        }];
        info!(
            "epoch 1: 1 rule, validation rms {:.6}, r2 {:.6}",
            best_rms, best_r2
        );

        loop {
            let split_rules: Vec<usize> = if self.config.shortcut {
                vec![global_model.worst_rule_index(train)?]
            } else {
                (0..global_model.rule_count()).collect()
            };
            let candidates: Vec<(usize, usize)> = split_rules
                .iter()
                .flat_map(|&r| (0..train.input_dim()).map(move |d| (r, d)))
                .collect();

            let trained: Vec<(FuzzyModel, f64)> = candidates
                .par_iter()
                .map(|&(rule, dim)| -> Result<(FuzzyModel, f64), ModelError> {
                    let mut candidate = global_model.split(rule, dim)?;
                    if self.config.reset_consequences {
                        candidate.reset_consequences();
                    }
                    candidate.train(
                        train,
                        valid,
                        self.config.min_iterations,
                        self.config.max_iterations,
                    )?;
                    let rms = candidate.estimate(valid)?;
                    debug!(
                        "candidate split (R{}, U{}): validation rms {:.6}",
                        rule + 1,
                        dim + 1,
                        rms
                    );
                    Ok((candidate, rms))
                })
                .collect::<Result<Vec<_>, _>>()?;

            // Deterministic winner: first candidate with the strictly lowest RMS,
            // matching a sequential scan over the candidate order.
            let mut winner = 0;
            for (i, (_, rms)) in trained.iter().enumerate() {
                if *rms < trained[winner].1 {
                    winner = i;
                }
            }
            let (mut epoch_model, _) = trained
                .into_iter()
                .nth(winner)
                .ok_or_else(|| ModelError::ProcessingError("no split candidates".to_string()))?;

            if self.config.optimize_epoch_best > 0 {
                epoch_model.train(train, valid, 1, self.config.optimize_epoch_best)?;
            }
            let epoch_rms = epoch_model.estimate(valid)?;
            let epoch_r2 = epoch_model.r_squared(valid)?;
            epochs.push(EpochReport {
                rules: epoch_model.rule_count(),
                validation_rms: epoch_rms,
                r_squared: epoch_r2,
            });
            info!(
                "epoch {}: {} rules, validation rms {:.6}, r2 {:.6}",
                epochs.len(),
                epoch_model.rule_count(),
                epoch_rms,
                epoch_r2
            );

            // The best model is tracked by validation RMS; while the rule
            // count is still below the minimum every epoch replaces it.
            if epoch_rms < best_rms || best_model.rule_count() < self.config.min_rules {
                best_model = epoch_model.clone();
                best_rms = epoch_rms;
                best_r2 = epoch_r2;
            }

            let rules = epoch_model.rule_count();
            let keep_growing = (epoch_r2 > global_r2 + self.config.r2_improvement
                && rules < self.config.max_rules)
                || rules < self.config.min_rules;
            global_model = epoch_model;
            global_r2 = epoch_r2;
            if !keep_growing {
                break;
            }
        }

        if self.config.optimize_global_best > 0 {
            let mut tuned = best_model.clone();
            tuned.train(train, valid, 1, self.config.optimize_global_best)?;
            let rms = tuned.estimate(valid)?;
            if rms < best_rms {
                best_r2 = tuned.r_squared(valid)?;
                best_rms = rms;
                best_model = tuned;
                info!(
                    "final training improved the best model to rms {:.6}",
                    best_rms
                );
            }
        }

        if self.config.joint_tuning == JointTuning::HookeJeeves {
            let mut tuned = best_model.clone();
            let minimizer = HookeJeevesMinimizer::new(self.config.max_joint_iterations);
            {
                let mut space = ModelTuning::new(&mut tuned, train);
                minimizer.minimize(&mut space);
            }
            let rms = tuned.estimate(valid)?;
            if rms < best_rms {
                best_r2 = tuned.r_squared(valid)?;
                best_rms = rms;
                best_model = tuned;
                info!("joint tuning improved the best model to rms {:.6}", best_rms);
            }
        }

        Ok(SearchOutcome {
            model: best_model,
            validation_rms: best_rms,
            r_squared: best_r2,
            epochs,
        })
    }
}
