use chrono::{DateTime, Utc};
use hex;
use sha2::{Digest, Sha256};
use shared::ModelSummary;
use std::fs;
use std::path::Path;

use super::artifact::PipelineArtifact;
use super::{FeatureRow, ModelError, TrainedModel};

/// A fitted preprocessing + regression pipeline loaded from its JSON export.
#[derive(Debug)]
pub struct PipelineModel {
    artifact: PipelineArtifact,
    sha256: String,
    loaded_at: DateTime<Utc>,
}

impl PipelineModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = fs::read(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model = Self::from_slice(&bytes)?;
        log::info!(
            "Loaded model '{}' ({}) from {} [sha256 {}]",
            model.artifact.name,
            model.artifact.regressor.kind(),
            path.display(),
            model.sha256
        );
        Ok(model)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: PipelineArtifact = serde_json::from_slice(bytes)?;
        artifact.validate()?;
        Ok(Self {
            artifact,
            sha256: Self::calculate_artifact_hash(bytes),
            loaded_at: Utc::now(),
        })
    }

    pub fn calculate_artifact_hash(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    fn encode(&self, row: &FeatureRow) -> Result<Vec<f64>, ModelError> {
        let mut encoded = Vec::with_capacity(self.artifact.encoded_width());
        for transform in &self.artifact.transforms {
            transform.encode(row, &mut encoded)?;
        }
        Ok(encoded)
    }
}

impl TrainedModel for PipelineModel {
    fn predict(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        let encoded = self.encode(row)?;
        let prediction = self.artifact.regressor.predict(&encoded)?;
        log::debug!(
            "Model '{}' predicted {} for columns {:?}",
            self.artifact.name,
            prediction,
            row.column_names()
        );
        Ok(prediction)
    }

    fn summary(&self) -> ModelSummary {
        ModelSummary {
            name: self.artifact.name.clone(),
            kind: self.artifact.regressor.kind().to_string(),
            features: self.artifact.feature_names(),
            sha256: self.sha256.clone(),
            loaded_at: self.loaded_at.to_rfc3339(),
        }
    }
}
