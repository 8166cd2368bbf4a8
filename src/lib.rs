//! Binary classification training harness
//!
//! A fixed-topology feed-forward network trained with class-weighted binary
//! cross-entropy, validation tracking and early stopping, built on burn.

pub mod data;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide errors
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Label at index {index} must be 0 or 1, got {value}")]
    InvalidLabel { index: usize, value: f32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tensor data error: {0}")]
    Data(String),

    #[error("Model record error: {0}")]
    Record(String),

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub loss: LossConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub print_every: usize,
    /// Early stopping window in epochs, 0 disables it
    pub early_stopping: usize,
    pub seed: u64,
    /// "adam" or "sgd"
    pub optimizer: String,
    /// Z-score features with statistics from the training set
    pub standardize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub leaky_slope: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LossConfig {
    pub weight_negative: f32,
    pub weight_positive: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub train_path: String,
    pub val_path: String,
    pub model_path: String,
    pub plot_path: Option<String>,
    pub history_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            training: TrainingConfig {
                epochs: 100,
                batch_size: 32,
                learning_rate: 1e-3,
                print_every: 10,
                early_stopping: 0,
                seed: 42,
                optimizer: "adam".to_string(),
                standardize: false,
            },
            model: ModelConfig { leaky_slope: 0.01 },
            loss: LossConfig {
                weight_negative: 1.0,
                weight_positive: 1.0,
            },
            data: DataConfig {
                train_path: "data/train.csv".to_string(),
                val_path: "data/val.csv".to_string(),
                model_path: "model/classifier".to_string(),
                plot_path: None,
                history_path: None,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifierError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| ClassifierError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClassifierError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
