use smartcore::linalg::basic::matrix::DenseMatrix;
use std::panic::{self, AssertUnwindSafe};

use super::artifact::{invalid, Regressor};
use super::ModelError;

impl Regressor {
    pub fn kind(&self) -> &'static str {
        match self {
            Regressor::Linear { .. } => "linear",
            Regressor::RandomForest { .. } => "random_forest",
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Regressor::Linear { n_features, .. } | Regressor::RandomForest { n_features, .. } => {
                *n_features
            }
        }
    }

    /// Evaluates one encoded row. Forest splits see the row at float32
    /// precision, the way the exporting library compared it during fitting.
    pub fn predict(&self, encoded: &[f64]) -> Result<f64, ModelError> {
        if encoded.len() != self.n_features() {
            return Err(ModelError::Evaluation(format!(
                "expected {} encoded columns, got {}",
                self.n_features(),
                encoded.len()
            )));
        }

        let predictions = match self {
            Regressor::Linear { model, .. } => model.predict(&single_row(encoded.to_vec())?),
            Regressor::RandomForest { model, .. } => {
                let narrowed = encoded.iter().map(|&v| v as f32 as f64).collect();
                model.predict(&single_row(narrowed)?)
            }
        }
        .map_err(|e| ModelError::Evaluation(e.to_string()))?;

        predictions
            .first()
            .copied()
            .ok_or_else(|| ModelError::Evaluation("no prediction returned".into()))
    }

    /// Runs the fitted model once on an all-zero row. smartcore indexes its
    /// matrices and tree nodes without bounds checks of its own, so a
    /// malformed export panics here instead of on a request thread.
    pub fn validate(&self, width: usize) -> Result<(), ModelError> {
        if self.n_features() != width {
            return Err(invalid(format!(
                "{} regressor expects {} features but the transforms produce {}",
                self.kind(),
                self.n_features(),
                width
            )));
        }

        let zeros = vec![0.0; width];
        match panic::catch_unwind(AssertUnwindSafe(|| self.predict(&zeros))) {
            Ok(Ok(value)) if value.is_finite() => Ok(()),
            Ok(Ok(value)) => Err(invalid(format!(
                "{} regressor produced {} on an all-zero row",
                self.kind(),
                value
            ))),
            Ok(Err(e)) => Err(invalid(e.to_string())),
            Err(_) => Err(invalid(format!(
                "{} regressor is structurally malformed",
                self.kind()
            ))),
        }
    }
}

fn single_row(values: Vec<f64>) -> Result<DenseMatrix<f64>, ModelError> {
    let width = values.len();
    DenseMatrix::new(1, width, values, false).map_err(|e| ModelError::Evaluation(e.to_string()))
}
