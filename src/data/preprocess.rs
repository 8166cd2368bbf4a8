//! Feature preprocessing applied to every batch before the forward pass

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::data::dataset::ClassificationDataset;

/// A transform applied to a `[batch, features]` tensor.
///
/// Generic over the backend so the same transform runs on the autodiff
/// model during training and on the inner model during scoring.
pub trait Preprocess {
    fn apply<B: Backend>(&self, features: Tensor<B, 2>) -> Tensor<B, 2>;
}

/// Leaves features unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Preprocess for Identity {
    fn apply<B: Backend>(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        features
    }
}

/// Feature normalization (z-score) with statistics from a training set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardize {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl Standardize {
    /// Smallest standard deviation used, so constant features don't divide by zero
    pub const MIN_STD: f32 = 0.001;

    /// Compute from training dataset
    pub fn from_dataset(dataset: &ClassificationDataset) -> Self {
        let dim = dataset.feature_dim();
        let mut sum = vec![0.0f32; dim];
        let mut sum_sq = vec![0.0f32; dim];

        for sample in dataset.samples() {
            for (j, v) in sample.features.iter().enumerate() {
                sum[j] += v;
                sum_sq[j] += v * v;
            }
        }

        let n = dataset.samples().len().max(1) as f32;
        let mean: Vec<f32> = sum.iter().map(|s| s / n).collect();
        let std: Vec<f32> = sum_sq
            .iter()
            .zip(mean.iter())
            .map(|(sq, m)| ((sq / n - m * m).max(0.0).sqrt()).max(Self::MIN_STD))
            .collect();

        Standardize { mean, std }
    }
}

impl Preprocess for Standardize {
    /// (x - mean) / std
    fn apply<B: Backend>(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = features.device();
        let mean = Tensor::<B, 1>::from_floats(self.mean.as_slice(), &device).unsqueeze_dim(0);
        let std = Tensor::<B, 1>::from_floats(self.std.as_slice(), &device).unsqueeze_dim(0);

        (features - mean) / std
    }
}

/// Either of the built-in transforms, picked at runtime from config
#[derive(Debug, Clone)]
pub enum FeatureTransform {
    Identity,
    Standardize(Standardize),
}

impl Preprocess for FeatureTransform {
    fn apply<B: Backend>(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            FeatureTransform::Identity => Identity.apply(features),
            FeatureTransform::Standardize(norm) => norm.apply(features),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::tensor_to_vec;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_standardize_statistics() {
        let dataset = ClassificationDataset::new(
            vec![vec![1.0, 5.0], vec![3.0, 5.0]],
            vec![0.0, 1.0],
        )
        .unwrap();
        let norm = Standardize::from_dataset(&dataset);

        assert_eq!(norm.mean, vec![2.0, 5.0]);
        assert!((norm.std[0] - 1.0).abs() < 1e-6);
        // Constant column falls back to the floor
        assert_eq!(norm.std[1], Standardize::MIN_STD);
    }

    #[test]
    fn test_standardize_apply() {
        let device = Default::default();
        let norm = Standardize {
            mean: vec![2.0, 0.0],
            std: vec![2.0, 1.0],
        };
        let x = Tensor::<TestBackend, 2>::from_floats([[4.0, 1.0], [0.0, -1.0]], &device);

        let out = tensor_to_vec(norm.apply(x)).unwrap();
        assert_eq!(out, vec![1.0, 1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_identity_is_noop() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_floats([[4.0, 1.0]], &device);
        let out = tensor_to_vec(FeatureTransform::Identity.apply(x)).unwrap();
        assert_eq!(out, vec![4.0, 1.0]);
    }
}
