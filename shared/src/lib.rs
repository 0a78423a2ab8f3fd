use serde::{Deserialize, Serialize};

/// A numeric field as it arrives over the wire: either a JSON number or a
/// string holding one (HTML form inputs submit strings).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum NumberLike {
    Number(f64),
    Text(String),
}

impl From<f64> for NumberLike {
    fn from(value: f64) -> Self {
        NumberLike::Number(value)
    }
}

impl From<&str> for NumberLike {
    fn from(value: &str) -> Self {
        NumberLike::Text(value.to_string())
    }
}

/// Body of `POST /predict`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct YieldRequest {
    pub area: Option<NumberLike>,
    pub crop: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub season: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct YieldResponse {
    pub predicted_production: f64,
    pub total_production: f64,
}

/// Body of `POST /predictprice`. Keys follow the dataset column names.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ProductionRequest {
    #[serde(rename = "Crop_Year")]
    pub crop_year: Option<NumberLike>,
    #[serde(rename = "Crop")]
    pub crop: Option<String>,
    #[serde(rename = "Season")]
    pub season: Option<String>,
    #[serde(rename = "Area")]
    pub area: Option<NumberLike>,
    #[serde(rename = "State_Name")]
    pub state_name: Option<String>,
    #[serde(rename = "District_Name")]
    pub district_name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProductionResponse {
    pub predicted_production: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelSummary {
    pub name: String,
    pub kind: String,
    pub features: Vec<String>,
    pub sha256: String,
    pub loaded_at: String,
}

/// Body of `GET /models`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelsResponse {
    #[serde(rename = "yield")]
    pub yield_model: ModelSummary,
    pub production: ModelSummary,
}
