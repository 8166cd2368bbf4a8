//! Dataset wrapper and batching for binary classification

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};

use crate::{ClassifierError, Result};

/// A single training sample: feature vector and binary label
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: Vec<f32>,
    /// 0.0 or 1.0
    pub label: f32,
}

/// Pairs feature rows with their labels for batched iteration
#[derive(Debug, Clone)]
pub struct ClassificationDataset {
    samples: Vec<Sample>,
    feature_dim: usize,
}

impl ClassificationDataset {
    /// Build a dataset from parallel feature rows and labels.
    ///
    /// Fails with `DimensionMismatch` if the counts differ or rows are ragged,
    /// and with `InvalidLabel` for labels other than 0 or 1.
    pub fn new(features: Vec<Vec<f32>>, labels: Vec<f32>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(ClassifierError::DimensionMismatch {
                context: "feature rows vs labels".to_string(),
                expected: features.len(),
                actual: labels.len(),
            });
        }

        let feature_dim = features.first().map(|row| row.len()).unwrap_or(0);
        let mut samples = Vec::with_capacity(features.len());

        for (index, (row, label)) in features.into_iter().zip(labels).enumerate() {
            if row.len() != feature_dim {
                return Err(ClassifierError::DimensionMismatch {
                    context: format!("feature width of row {}", index),
                    expected: feature_dim,
                    actual: row.len(),
                });
            }
            if label != 0.0 && label != 1.0 {
                return Err(ClassifierError::InvalidLabel { index, value: label });
            }
            samples.push(Sample {
                features: row,
                label,
            });
        }

        Ok(ClassificationDataset {
            samples,
            feature_dim,
        })
    }

    /// Build a dataset from a `[n, features]` tensor and a label tensor whose
    /// leading dimension is `n` and whose trailing dimensions are all 1.
    pub fn from_tensors<B: Backend, const D: usize>(
        features: Tensor<B, 2>,
        labels: Tensor<B, D>,
    ) -> Result<Self> {
        let [n, dim] = features.dims();
        let label_dims = labels.dims();
        let label_count = label_dims.first().copied().unwrap_or(0);

        if n != label_count {
            return Err(ClassifierError::DimensionMismatch {
                context: "feature samples vs label samples".to_string(),
                expected: n,
                actual: label_count,
            });
        }
        if let Some(extra) = label_dims.iter().skip(1).find(|d| **d != 1) {
            return Err(ClassifierError::DimensionMismatch {
                context: "trailing label dimension".to_string(),
                expected: 1,
                actual: *extra,
            });
        }

        let values = tensor_to_vec(features)?;
        let labels = tensor_to_vec(labels)?;

        let rows = if dim == 0 {
            vec![Vec::new(); n]
        } else {
            values.chunks(dim).map(|row| row.to_vec()).collect()
        };

        Self::new(rows, labels)
    }

    /// Feature vector width
    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    /// All samples in insertion order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Fraction of samples labelled positive
    pub fn positive_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let positives = self.samples.iter().filter(|s| s.label >= 0.5).count();
        positives as f64 / self.samples.len() as f64
    }
}

impl Dataset<Sample> for ClassificationDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Copy a float tensor back to host memory as `f32` values
pub(crate) fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ClassifierError::Data(format!("{:?}", e)))
}

/// Batch of samples on a device
#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    /// Features: [batch, features]
    pub features: Tensor<B, 2>,
    /// Binary targets: [batch]
    pub targets: Tensor<B, 1>,
}

impl<B: Backend> ClassificationBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Batcher for creating training batches
#[derive(Clone)]
pub struct ClassificationBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        ClassificationBatcher { device }
    }
}

impl<B: Backend> Batcher<B, Sample, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<Sample>, _device: &B::Device) -> ClassificationBatch<B> {
        let batch_size = items.len();
        let feature_dim = items.first().map(|s| s.features.len()).unwrap_or(0);

        let mut feature_data = Vec::with_capacity(batch_size * feature_dim);
        let mut target_data = Vec::with_capacity(batch_size);

        for sample in &items {
            feature_data.extend(sample.features.iter().map(|v| v.elem::<B::FloatElem>()));
            target_data.push(sample.label.elem::<B::FloatElem>());
        }

        let features = Tensor::<B, 2>::from_data(
            TensorData::new(feature_data, [batch_size, feature_dim]),
            &self.device,
        );
        let targets =
            Tensor::<B, 1>::from_data(TensorData::new(target_data, [batch_size]), &self.device);

        ClassificationBatch { features, targets }
    }
}
