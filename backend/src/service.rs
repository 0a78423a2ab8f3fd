use shared::{
    ModelsResponse, ProductionRequest, ProductionResponse, YieldRequest, YieldResponse,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_YIELD_SCALE_FACTOR;
use crate::model::{FeatureRow, ModelError, TrainedModel};
use crate::validation::{ProductionInput, ValidationError, YieldInput};

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Prediction failed: {0}")]
    Model(#[from] ModelError),
    #[error("Prediction timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
    #[error("Prediction worker failed: {0}")]
    Blocking(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionPolicy {
    pub yield_scale_factor: f64,
    /// Applied to both endpoints.
    pub clamp_negative: bool,
    pub timeout: Duration,
}

impl Default for PredictionPolicy {
    fn default() -> Self {
        Self {
            yield_scale_factor: DEFAULT_YIELD_SCALE_FACTOR,
            clamp_negative: true,
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Serves both prediction endpoints from two independently trained models.
#[derive(Clone)]
pub struct PredictionService {
    yield_model: Arc<dyn TrainedModel>,
    production_model: Arc<dyn TrainedModel>,
    policy: PredictionPolicy,
}

impl PredictionService {
    pub fn new(
        yield_model: Arc<dyn TrainedModel>,
        production_model: Arc<dyn TrainedModel>,
        policy: PredictionPolicy,
    ) -> Self {
        Self {
            yield_model,
            production_model,
            policy,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.policy.timeout
    }

    /// Yield per hectare (scaled) and total production for the given area.
    pub fn predict_yield(&self, request: &YieldRequest) -> Result<YieldResponse, PredictionError> {
        let input = YieldInput::try_from(request)?;
        let raw = self.invoke(self.yield_model.as_ref(), &input.to_feature_row())?;

        let predicted_production = finite(round2(raw * self.policy.yield_scale_factor))?;
        let total_production = finite(round2(predicted_production * input.area))?;

        log::info!(
            "Yield prediction for {} / {} / {} / {}: {} per hectare, {} total over {}",
            input.crop,
            input.state,
            input.district,
            input.season,
            predicted_production,
            total_production,
            input.area
        );

        Ok(YieldResponse {
            predicted_production,
            total_production,
        })
    }

    pub fn predict_production_by_year(
        &self,
        request: &ProductionRequest,
    ) -> Result<ProductionResponse, PredictionError> {
        let input = ProductionInput::try_from(request)?;
        let raw = self.invoke(self.production_model.as_ref(), &input.to_feature_row())?;
        let predicted_production = finite(round2(raw))?;

        log::info!(
            "Production prediction for {} {} in {}: {}",
            input.crop,
            input.crop_year,
            input.district_name,
            predicted_production
        );

        Ok(ProductionResponse {
            predicted_production,
        })
    }

    pub fn models(&self) -> ModelsResponse {
        ModelsResponse {
            yield_model: self.yield_model.summary(),
            production: self.production_model.summary(),
        }
    }

    fn invoke(&self, model: &dyn TrainedModel, row: &FeatureRow) -> Result<f64, PredictionError> {
        let raw = model.predict(row)?;
        if !raw.is_finite() {
            return Err(ModelError::NonFinite(raw).into());
        }
        if self.policy.clamp_negative && raw <= 0.0 {
            if raw < 0.0 {
                log::warn!(
                    "Model '{}' returned negative prediction {}, clamping to 0",
                    model.summary().name,
                    raw
                );
            }
            return Ok(0.0);
        }
        Ok(raw)
    }
}

/// Scaling and rounding can overflow even when the raw prediction is finite.
fn finite(value: f64) -> Result<f64, PredictionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::NonFinite(value).into())
    }
}

/// Rounds half away from zero to two decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
