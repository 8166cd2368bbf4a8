//! Prediction and inference
//!
//! Load trained models and score new feature rows.

pub mod inference;

pub use inference::{ModelArtifact, Predictor};
