pub mod artifact;
pub mod encoder;
pub mod pipeline;
pub mod regressor;

use shared::ModelSummary;

pub use pipeline::PipelineModel;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Unknown category '{value}' for column {column}")]
    UnknownCategory { column: String, value: String },
    #[error("Missing feature column: {0}")]
    MissingFeature(String),
    #[error("Feature {column} expected a {expected} value")]
    FeatureType {
        column: String,
        expected: &'static str,
    },
    #[error("Model produced a non-finite prediction: {0}")]
    NonFinite(f64),
    #[error("Model evaluation failed: {0}")]
    Evaluation(String),
    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

/// A single named row handed to a model. Column order is the order the
/// columns were added in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    columns: Vec<(String, FeatureValue)>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric(mut self, name: &str, value: f64) -> Self {
        self.columns
            .push((name.to_string(), FeatureValue::Numeric(value)));
        self
    }

    pub fn with_categorical(mut self, name: &str, value: impl Into<String>) -> Self {
        self.columns
            .push((name.to_string(), FeatureValue::Categorical(value.into())));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn numeric(&self, name: &str) -> Result<f64, ModelError> {
        match self.get(name) {
            Some(FeatureValue::Numeric(value)) => Ok(*value),
            Some(FeatureValue::Categorical(_)) => Err(ModelError::FeatureType {
                column: name.to_string(),
                expected: "numeric",
            }),
            None => Err(ModelError::MissingFeature(name.to_string())),
        }
    }

    pub fn categorical(&self, name: &str) -> Result<&str, ModelError> {
        match self.get(name) {
            Some(FeatureValue::Categorical(value)) => Ok(value),
            Some(FeatureValue::Numeric(_)) => Err(ModelError::FeatureType {
                column: name.to_string(),
                expected: "categorical",
            }),
            None => Err(ModelError::MissingFeature(name.to_string())),
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// A fitted regression artifact. Implementations must be immutable once
/// loaded since a single instance serves every request.
pub trait TrainedModel: Send + Sync {
    fn predict(&self, row: &FeatureRow) -> Result<f64, ModelError>;

    fn summary(&self) -> ModelSummary;
}
