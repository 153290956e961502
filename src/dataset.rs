use crate::error::ModelError;
use ndarray::{Array1, Array2, ArrayView1};

/// In-memory training or validation data with optional normalization metadata.
///
/// Inputs are stored row-wise, one pattern per row. The scale factors and
/// shifts describe how the data were normalized (`normalized = (raw - shift) * factor`)
/// and are only consumed when reporting denormalized values; the default is the
/// identity scaling. The last scale entry belongs to the target column. The
/// block size groups consecutive patterns for blocked reporting and defaults
/// to the whole dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    inputs: Array2<f64>,
    targets: Array1<f64>,
    scale_factors: Vec<f64>,
    scale_shifts: Vec<f64>,
    block_size: usize,
    target_mean: f64,
    target_variance: f64,
}

impl Dataset {
    /// Creates a dataset from an input matrix and a target vector
    ///
    /// # Parameters
    ///
    /// - `inputs` - Pattern matrix, one row per pattern
    /// - `targets` - Target value per pattern
    ///
    /// # Returns
    ///
    /// * `Ok(Dataset)` - If the data are non-empty, consistent and finite
    /// * `Err(ModelError::InputValidationError)` - Otherwise
    pub fn new(inputs: Array2<f64>, targets: Array1<f64>) -> Result<Self, ModelError> {
        if inputs.nrows() == 0 || inputs.ncols() == 0 {
            return Err(ModelError::InputValidationError(
                "dataset must contain at least one pattern and one input column".to_string(),
            ));
        }
        if inputs.nrows() != targets.len() {
            return Err(ModelError::InputValidationError(format!(
                "input rows ({}) and target length ({}) do not match",
                inputs.nrows(),
                targets.len()
            )));
        }
        if inputs.iter().any(|v| !v.is_finite()) || targets.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::InputValidationError(
                "dataset contains non-finite values".to_string(),
            ));
        }

        let n = targets.len() as f64;
        let target_mean = targets.sum() / n;
        let target_variance = targets
            .iter()
            .map(|y| (y - target_mean).powi(2))
            .sum::<f64>()
            / n;
        let n_cols = inputs.ncols();

        let block_size = targets.len();
        Ok(Dataset {
            inputs,
            targets,
            scale_factors: vec![1.0; n_cols + 1],
            scale_shifts: vec![0.0; n_cols + 1],
            block_size,
            target_mean,
            target_variance,
        })
    }

    /// Creates a dataset from plain row vectors; the last element of each row is the target
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ModelError> {
        if rows.is_empty() || rows[0].len() < 2 {
            return Err(ModelError::InputValidationError(
                "rows must be non-empty with at least one input and the target".to_string(),
            ));
        }
        let n_cols = rows[0].len() - 1;
        if rows.iter().any(|r| r.len() != n_cols + 1) {
            return Err(ModelError::InputValidationError(
                "all rows must have the same length".to_string(),
            ));
        }
        let mut inputs = Array2::zeros((rows.len(), n_cols));
        let mut targets = Array1::zeros(rows.len());
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row[..n_cols].iter().enumerate() {
                inputs[[i, j]] = *v;
            }
            targets[i] = row[n_cols];
        }
        Dataset::new(inputs, targets)
    }

    /// Attaches normalization metadata, input columns first and the target last
    ///
    /// # Returns
    ///
    /// * `Ok(Dataset)` - If both vectors have length `input_dim + 1`
    /// * `Err(ModelError::InputValidationError)` - Otherwise
    pub fn with_scaling(
        mut self,
        scale_factors: Vec<f64>,
        scale_shifts: Vec<f64>,
    ) -> Result<Self, ModelError> {
        let expected = self.input_dim() + 1;
        if scale_factors.len() != expected || scale_shifts.len() != expected {
            return Err(ModelError::InputValidationError(format!(
                "scaling metadata must have length {}, got {} factors and {} shifts",
                expected,
                scale_factors.len(),
                scale_shifts.len()
            )));
        }
        self.scale_factors = scale_factors;
        self.scale_shifts = scale_shifts;
        Ok(self)
    }

    /// Sets the number of consecutive patterns per block
    ///
    /// # Returns
    ///
    /// * `Ok(Dataset)` - If `block_size` is positive
    /// * `Err(ModelError::InputValidationError)` - Otherwise
    pub fn with_block_size(mut self, block_size: usize) -> Result<Self, ModelError> {
        if block_size == 0 {
            return Err(ModelError::InputValidationError(
                "block size must be positive".to_string(),
            ));
        }
        self.block_size = block_size;
        Ok(self)
    }

    /// Number of patterns
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Number of input columns
    pub fn input_dim(&self) -> usize {
        self.inputs.ncols()
    }

    /// Input row of one pattern
    pub fn input(&self, pattern: usize) -> ArrayView1<'_, f64> {
        self.inputs.row(pattern)
    }

    /// Target value of one pattern
    pub fn target(&self, pattern: usize) -> f64 {
        self.targets[pattern]
    }

    pub fn inputs(&self) -> &Array2<f64> {
        &self.inputs
    }

    pub fn targets(&self) -> &Array1<f64> {
        &self.targets
    }

    /// Number of consecutive patterns per block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn target_mean(&self) -> f64 {
        self.target_mean
    }

    pub fn target_variance(&self) -> f64 {
        self.target_variance
    }

    /// Scale factor of the target column
    pub fn target_scale_factor(&self) -> f64 {
        self.scale_factors[self.scale_factors.len() - 1]
    }

    /// True when the attached scaling is not the identity
    pub fn is_scaled(&self) -> bool {
        self.scale_factors.iter().any(|f| *f != 1.0) || self.scale_shifts.iter().any(|s| *s != 0.0)
    }

    /// Maps a normalized input value back to its raw range
    pub fn denormalize_input(&self, col: usize, value: f64) -> f64 {
        denormalize(value, self.scale_factors[col], self.scale_shifts[col])
    }

    /// Maps a normalized target or prediction back to its raw range
    pub fn denormalize_target(&self, value: f64) -> f64 {
        let last = self.scale_factors.len() - 1;
        denormalize(value, self.scale_factors[last], self.scale_shifts[last])
    }
}

/// `(raw - shift) * factor`
pub fn normalize(raw: f64, factor: f64, shift: f64) -> f64 {
    (raw - shift) * factor
}

/// `normalized / factor + shift`
pub fn denormalize(normalized: f64, factor: f64, shift: f64) -> f64 {
    if factor == 0.0 {
        normalized
    } else {
        normalized / factor + shift
    }
}
