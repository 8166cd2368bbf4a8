//! Model inference for predictions

use std::path::PathBuf;

use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use serde::{Deserialize, Serialize};

use crate::data::dataset::{tensor_to_vec, ClassificationBatcher, ClassificationDataset};
use crate::data::preprocess::{FeatureTransform, Preprocess, Standardize};
use crate::model::{Classifier, ClassifierConfig};
use crate::training::loss::ClassWeights;
use crate::training::metrics::{Metrics, THRESHOLD};
use crate::training::trainer::score_epoch;
use crate::{ClassifierError, Result};

/// Network shape and preprocessing stored next to the weights.
///
/// Written as `<model_path>.json`; the recorder writes `<model_path>.mpk`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub config: ClassifierConfig,
    pub standardize: Option<Standardize>,
}

impl ModelArtifact {
    pub fn new(config: ClassifierConfig, standardize: Option<Standardize>) -> Self {
        ModelArtifact {
            config,
            standardize,
        }
    }

    pub fn path_for(model_path: &str) -> PathBuf {
        PathBuf::from(format!("{}.json", model_path))
    }

    pub fn save(&self, model_path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ClassifierError::Parse(format!("Failed to serialize artifact: {}", e)))?;
        std::fs::write(Self::path_for(model_path), content)?;
        Ok(())
    }

    pub fn load(model_path: &str) -> Result<Self> {
        let path = Self::path_for(model_path);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ClassifierError::Config(format!(
                "Failed to read model artifact {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| ClassifierError::Parse(format!("Invalid model artifact: {}", e)))
    }

    pub fn transform(&self) -> FeatureTransform {
        match &self.standardize {
            Some(s) => FeatureTransform::Standardize(s.clone()),
            None => FeatureTransform::Identity,
        }
    }
}

/// Scores feature rows with a trained classifier
pub struct Predictor<B: Backend> {
    model: Classifier<B>,
    transform: FeatureTransform,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Create a new predictor
    pub fn new(model: Classifier<B>, transform: FeatureTransform, device: B::Device) -> Self {
        Predictor {
            model,
            transform,
            device,
        }
    }

    /// Load predictor from saved model and its artifact
    pub fn load(model_path: &str, device: B::Device) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let artifact = ModelArtifact::load(model_path)?;
        let model = Classifier::load(&device, model_path, &artifact.config)?;
        log::info!(
            "Loaded model from {} ({} input features)",
            model_path,
            artifact.config.input_size
        );
        Ok(Self::new(model, artifact.transform(), device))
    }

    pub fn model(&self) -> &Classifier<B> {
        &self.model
    }

    /// Positive-class probability for each row
    pub fn predict_proba(&self, rows: &[Vec<f32>]) -> Result<Vec<f32>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let width = self.model.input_size();
        let mut values = Vec::with_capacity(rows.len() * width);
        for (index, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(ClassifierError::DimensionMismatch {
                    context: format!("feature width of row {}", index),
                    expected: width,
                    actual: row.len(),
                });
            }
            values.extend(row.iter().map(|v| v.elem::<B::FloatElem>()));
        }

        let features = Tensor::<B, 2>::from_data(
            TensorData::new(values, [rows.len(), width]),
            &self.device,
        );
        let output = self.model.forward(self.transform.apply(features));
        tensor_to_vec(output)
    }

    /// Thresholded class (0 or 1) for each row
    pub fn predict(&self, rows: &[Vec<f32>]) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(rows)?
            .into_iter()
            .map(|p| u8::from(p >= THRESHOLD))
            .collect())
    }

    /// Loss and accuracy on a labelled set, batched like a validation pass
    pub fn evaluate(
        &self,
        dataset: ClassificationDataset,
        loss_weight: ClassWeights,
        batch_size: usize,
    ) -> Result<Metrics> {
        if dataset.is_empty() {
            return Err(ClassifierError::EmptyDataset(
                "evaluation set has no samples".to_string(),
            ));
        }
        if dataset.feature_dim() != self.model.input_size() {
            return Err(ClassifierError::DimensionMismatch {
                context: "evaluation feature width vs network input".to_string(),
                expected: self.model.input_size(),
                actual: dataset.feature_dim(),
            });
        }

        let loader = DataLoaderBuilder::new(ClassificationBatcher::<B>::new(self.device.clone()))
            .batch_size(batch_size.max(1))
            .build(dataset);

        score_epoch(&self.model, loader.iter(), &self.transform, loss_weight)
    }
}
