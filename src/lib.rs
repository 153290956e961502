//! # fuzzyreg
//!
//! Automatic identification of Takagi-Sugeno fuzzy models from numeric data.
//!
//! A model is a small set of rules, each combining a fuzzy premise over the
//! input space with an affine consequence function; the model output is the
//! firing-strength weighted mean of the rule consequences. Models are grown
//! from a single rule by repeatedly splitting the rule that benefits most,
//! with every candidate trained and cross-validated before it is accepted.
//!
//! ## Highlights
//!
//! - **Membership functions**: sigmoid or trapezoid edges with a center and a
//!   signed steepness, pairs of which describe fuzzy intervals
//! - **Closed-form consequences**: linear least squares via a built-in
//!   Golub-Reinsch singular value decomposition
//! - **Training**: RPROP or momentum gradient descent with validation-gated
//!   batch acceptance and exact rollback
//! - **Structure search**: greedy rule splitting with cross-validated
//!   candidate selection and R²-based termination
//! - **Fine-tuning**: optional Hooke-Jeeves direct search over all parameters
//! - **Drift detection**: two-sided Page-Hinkley test over residual streams
//!
//! ## Example
//!
//! ```rust
//! use fuzzyreg::{Dataset, ModelConfig, StructureSearch};
//!
//! let rows: Vec<Vec<f64>> = (0..40)
//!     .map(|i| {
//!         let u = -0.5 + i as f64 / 40.0;
//!         vec![u, u.abs()]
//!     })
//!     .collect();
//! let train = Dataset::from_rows(&rows).unwrap();
//! let valid = train.clone();
//!
//! let config = ModelConfig {
//!     consequence_dim: 2,
//!     max_rules: 3,
//!     optimize_global_best: 0,
//!     ..Default::default()
//! };
//! let outcome = StructureSearch::new(config).run(&train, &valid).unwrap();
//! assert!(outcome.model.rule_count() >= 2);
//! ```

/// Configuration for model construction, training and structure search
pub mod config;
/// In-memory datasets with normalization metadata
pub mod dataset;
/// Error types for model operations and persistence
pub mod error;
/// Membership functions with center and signed steepness
pub mod membership;
/// The Takagi-Sugeno fuzzy model and its training operations
pub mod model;
/// Per-parameter optimizer state and the Hooke-Jeeves minimizer
pub mod optimizer;
/// Page-Hinkley drift detection
pub mod page_hinkley;
/// Takagi-Sugeno rules: fuzzy premises and affine consequences
pub mod rule;
/// Greedy structure search with cross-validated candidate selection
pub mod search;
/// Golub-Reinsch singular value decomposition and least squares
pub mod svd;

pub use config::{ErrorNorm, JointTuning, MembershipShape, ModelConfig, OptimizerKind};
pub use dataset::Dataset;
pub use error::{IoError, ModelError};
pub use membership::MembershipFunction;
pub use model::{FuzzyModel, ModelTuning, PatternRecord};
pub use optimizer::{HookeJeevesMinimizer, ParamRef, ParameterSpace, StepState};
pub use page_hinkley::{DriftStatus, PageHinkley};
pub use rule::{Premise, Rule};
pub use search::{EpochReport, SearchOutcome, StructureSearch};
pub use svd::{solve_least_squares, svd};

#[cfg(test)]
mod test;
