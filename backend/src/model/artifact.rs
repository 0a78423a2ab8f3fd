use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::LinearRegression;
use std::collections::{HashMap, HashSet};

use super::ModelError;

pub type LinearModel = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;
pub type ForestModel = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// JSON export of a fitted column-transformer + regressor pipeline.
#[derive(Debug, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub name: String,
    pub features: Vec<FeatureSpec>,
    pub transforms: Vec<ColumnTransform>,
    pub regressor: Regressor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub kind: FeatureKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Numeric,
    Categorical,
}

/// What an encoder does with a category it never saw during fitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    /// Target encoders fall back to the prior, one-hot encoders emit zeros.
    #[default]
    #[serde(alias = "value", alias = "ignore")]
    Lenient,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnTransform {
    TargetEncoder {
        column: String,
        mapping: HashMap<String, f64>,
        prior: f64,
        #[serde(default)]
        handle_unknown: UnknownPolicy,
    },
    OneHot {
        column: String,
        categories: Vec<String>,
        #[serde(default)]
        handle_unknown: UnknownPolicy,
    },
    StandardScaler {
        column: String,
        mean: f64,
        scale: f64,
    },
    Passthrough {
        column: String,
    },
}

/// The fitted estimator in smartcore's own serde layout. `n_features` is
/// the encoded row width the estimator was fitted on.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Regressor {
    Linear { n_features: usize, model: LinearModel },
    RandomForest { n_features: usize, model: ForestModel },
}

impl PipelineArtifact {
    pub fn encoded_width(&self) -> usize {
        self.transforms.iter().map(ColumnTransform::width).sum()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.features.is_empty() {
            return Err(invalid("no features declared"));
        }
        if self.transforms.is_empty() {
            return Err(invalid("no transforms declared"));
        }

        let mut kinds = HashMap::new();
        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature.name.as_str()) {
                return Err(invalid(format!("duplicate feature {}", feature.name)));
            }
            kinds.insert(feature.name.as_str(), feature.kind);
        }

        for transform in &self.transforms {
            let column = transform.column();
            let declared = kinds
                .get(column)
                .ok_or_else(|| invalid(format!("transform uses undeclared column {}", column)))?;
            if *declared != transform.input_kind() {
                return Err(invalid(format!(
                    "column {} is {:?} but its transform expects {:?}",
                    column,
                    declared,
                    transform.input_kind()
                )));
            }
            transform.validate()?;
        }

        self.regressor.validate(self.encoded_width())
    }
}

pub(super) fn invalid(message: impl Into<String>) -> ModelError {
    ModelError::InvalidArtifact(message.into())
}
