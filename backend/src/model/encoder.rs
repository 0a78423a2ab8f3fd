use super::artifact::{invalid, ColumnTransform, FeatureKind, UnknownPolicy};
use super::{FeatureRow, ModelError};

impl ColumnTransform {
    pub fn column(&self) -> &str {
        match self {
            ColumnTransform::TargetEncoder { column, .. }
            | ColumnTransform::OneHot { column, .. }
            | ColumnTransform::StandardScaler { column, .. }
            | ColumnTransform::Passthrough { column } => column,
        }
    }

    pub fn input_kind(&self) -> FeatureKind {
        match self {
            ColumnTransform::TargetEncoder { .. } | ColumnTransform::OneHot { .. } => {
                FeatureKind::Categorical
            }
            ColumnTransform::StandardScaler { .. } | ColumnTransform::Passthrough { .. } => {
                FeatureKind::Numeric
            }
        }
    }

    /// Number of encoded columns this transform emits.
    pub fn width(&self) -> usize {
        match self {
            ColumnTransform::OneHot { categories, .. } => categories.len(),
            _ => 1,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        match self {
            ColumnTransform::TargetEncoder {
                column,
                mapping,
                prior,
                ..
            } => {
                if !prior.is_finite() || mapping.values().any(|v| !v.is_finite()) {
                    return Err(invalid(format!(
                        "target encoder for {} has non-finite values",
                        column
                    )));
                }
            }
            ColumnTransform::OneHot {
                column, categories, ..
            } => {
                if categories.is_empty() {
                    return Err(invalid(format!("one-hot encoder for {} has no categories", column)));
                }
            }
            ColumnTransform::StandardScaler {
                column, mean, scale, ..
            } => {
                if !mean.is_finite() || !scale.is_finite() {
                    return Err(invalid(format!("scaler for {} has non-finite values", column)));
                }
            }
            ColumnTransform::Passthrough { .. } => {}
        }
        Ok(())
    }

    /// Appends this transform's encoded columns for `row` to `out`.
    pub fn encode(&self, row: &FeatureRow, out: &mut Vec<f64>) -> Result<(), ModelError> {
        match self {
            ColumnTransform::TargetEncoder {
                column,
                mapping,
                prior,
                handle_unknown,
            } => {
                let category = row.categorical(column)?;
                match (mapping.get(category), handle_unknown) {
                    (Some(encoded), _) => out.push(*encoded),
                    (None, UnknownPolicy::Lenient) => out.push(*prior),
                    (None, UnknownPolicy::Error) => return Err(unknown(column, category)),
                }
            }
            ColumnTransform::OneHot {
                column,
                categories,
                handle_unknown,
            } => {
                let category = row.categorical(column)?;
                let hit = categories.iter().position(|c| c == category);
                if hit.is_none() && *handle_unknown == UnknownPolicy::Error {
                    return Err(unknown(column, category));
                }
                out.extend((0..categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
            }
            ColumnTransform::StandardScaler {
                column, mean, scale, ..
            } => {
                let value = row.numeric(column)?;
                // sklearn stores a unit scale for constant columns
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                out.push((value - mean) / scale);
            }
            ColumnTransform::Passthrough { column } => out.push(row.numeric(column)?),
        }
        Ok(())
    }
}

fn unknown(column: &str, category: &str) -> ModelError {
    ModelError::UnknownCategory {
        column: column.to_string(),
        value: category.to_string(),
    }
}
