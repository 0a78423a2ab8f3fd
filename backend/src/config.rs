use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::service::PredictionPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/serving.yaml";

/// Multiplier applied to the yield model output. Unconfirmed against the
/// units of the yield model's training target.
pub const DEFAULT_YIELD_SCALE_FACTOR: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid YAML in config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    pub version: f32,
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub prediction: PredictionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    #[serde(rename = "yield")]
    pub yield_model: PathBuf,
    pub production: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub yield_scale_factor: f64,
    pub clamp_negative: bool,
    pub timeout_ms: u64,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            server: ServerConfig::default(),
            models: ModelsConfig::default(),
            prediction: PredictionConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            yield_model: PathBuf::from("../models/yield_model.json"),
            production: PathBuf::from("../models/production_model.json"),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            yield_scale_factor: DEFAULT_YIELD_SCALE_FACTOR,
            clamp_negative: true,
            timeout_ms: 2000,
        }
    }
}

impl ServingConfig {
    /// Loads `SERVING_CONFIG` (or the default path), then applies
    /// environment overrides. A missing file falls back to defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("SERVING_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let config_path = Path::new(&config_path);

        let mut config = if config_path.exists() {
            let config = Self::from_file(config_path)?;
            log::info!(
                "Loaded serving config v{} from {}",
                config.version,
                config_path.display()
            );
            config
        } else {
            log::warn!(
                "Config file {} not found, using built-in defaults",
                config_path.display()
            );
            let mut config = Self::default();
            config.resolve_model_paths(config_dir(config_path));
            config
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&config_str, config_dir(path))
    }

    /// Parses YAML; relative model paths are resolved against `base_dir`.
    pub fn from_yaml_str(config_str: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: ServingConfig = serde_yaml::from_str(config_str)?;
        config.resolve_model_paths(base_dir);
        Ok(config)
    }

    fn resolve_model_paths(&mut self, base_dir: &Path) {
        self.models.yield_model = resolve(base_dir, &self.models.yield_model);
        self.models.production = resolve(base_dir, &self.models.production);
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_value("PORT", &port)?;
        }
        if let Some(path) = lookup("YIELD_MODEL_PATH") {
            self.models.yield_model = PathBuf::from(path);
        }
        if let Some(path) = lookup("PRODUCTION_MODEL_PATH") {
            self.models.production = PathBuf::from(path);
        }
        if let Some(timeout) = lookup("PREDICTION_TIMEOUT_MS") {
            self.prediction.timeout_ms = parse_value("PREDICTION_TIMEOUT_MS", &timeout)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let scale = self.prediction.yield_scale_factor;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "prediction.yield_scale_factor".into(),
                value: scale.to_string(),
            });
        }
        if self.prediction.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "prediction.timeout_ms".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn to_prediction_policy(&self) -> PredictionPolicy {
        PredictionPolicy {
            yield_scale_factor: self.prediction.yield_scale_factor,
            clamp_negative: self.prediction.clamp_negative,
            timeout: Duration::from_millis(self.prediction.timeout_ms),
        }
    }
}

fn config_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
