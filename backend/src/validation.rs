use shared::{NumberLike, ProductionRequest, YieldRequest};

use crate::model::FeatureRow;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Field {0} must not be blank")]
    BlankField(&'static str),
    #[error("Field {0} must be a number")]
    NotANumber(&'static str),
    #[error("Field {0} must be greater than zero")]
    NonPositive(&'static str),
    #[error("Field {0} must be a positive whole year")]
    InvalidYear(&'static str),
}

/// A `POST /predict` body that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldInput {
    pub area: f64,
    pub crop: String,
    pub state: String,
    pub district: String,
    pub season: String,
}

/// A `POST /predictprice` body that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionInput {
    pub crop_year: i64,
    pub crop: String,
    pub season: String,
    pub area: f64,
    pub state_name: String,
    pub district_name: String,
}

impl TryFrom<&YieldRequest> for YieldInput {
    type Error = ValidationError;

    fn try_from(request: &YieldRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            area: positive_number(&request.area, "area")?,
            crop: required_text(&request.crop, "crop")?,
            state: required_text(&request.state, "state")?,
            district: required_text(&request.district, "district")?,
            season: required_text(&request.season, "season")?,
        })
    }
}

impl YieldInput {
    pub fn to_feature_row(&self) -> FeatureRow {
        FeatureRow::new()
            .with_numeric("Area", self.area)
            .with_categorical("Crop", self.crop.as_str())
            .with_categorical("State_Name", self.state.as_str())
            .with_categorical("District_Name", self.district.as_str())
            .with_categorical("Season", self.season.as_str())
    }
}

impl TryFrom<&ProductionRequest> for ProductionInput {
    type Error = ValidationError;

    fn try_from(request: &ProductionRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            crop_year: whole_year(&request.crop_year, "Crop_Year")?,
            crop: required_text(&request.crop, "Crop")?,
            season: required_text(&request.season, "Season")?,
            area: positive_number(&request.area, "Area")?,
            state_name: required_text(&request.state_name, "State_Name")?,
            district_name: required_text(&request.district_name, "District_Name")?,
        })
    }
}

impl ProductionInput {
    pub fn to_feature_row(&self) -> FeatureRow {
        FeatureRow::new()
            .with_numeric("Crop_Year", self.crop_year as f64)
            .with_categorical("Crop", self.crop.as_str())
            .with_categorical("Season", self.season.as_str())
            .with_numeric("Area", self.area)
            .with_categorical("State_Name", self.state_name.as_str())
            .with_categorical("District_Name", self.district_name.as_str())
    }
}

/// Categories are passed through untouched: encoders match exact strings.
fn required_text(value: &Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        None => Err(ValidationError::MissingField(field)),
        Some(text) if text.trim().is_empty() => Err(ValidationError::BlankField(field)),
        Some(text) => Ok(text.clone()),
    }
}

fn number(value: &Option<NumberLike>, field: &'static str) -> Result<f64, ValidationError> {
    let parsed = match value {
        None => return Err(ValidationError::MissingField(field)),
        Some(NumberLike::Number(n)) => *n,
        Some(NumberLike::Text(text)) if text.trim().is_empty() => {
            return Err(ValidationError::MissingField(field));
        }
        Some(NumberLike::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::NotANumber(field))?,
    };
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ValidationError::NotANumber(field))
    }
}

fn positive_number(value: &Option<NumberLike>, field: &'static str) -> Result<f64, ValidationError> {
    let parsed = number(value, field)?;
    if parsed > 0.0 {
        Ok(parsed)
    } else {
        Err(ValidationError::NonPositive(field))
    }
}

fn whole_year(value: &Option<NumberLike>, field: &'static str) -> Result<i64, ValidationError> {
    let parsed = number(value, field)?;
    if parsed.fract() != 0.0 || parsed < 1.0 || parsed > i64::MAX as f64 {
        return Err(ValidationError::InvalidYear(field));
    }
    Ok(parsed as i64)
}
