//! Class-weighted binary cross-entropy

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::{ClassifierError, Result};

/// Probabilities are clamped to [EPSILON, 1 - EPSILON] before taking logs
pub const EPSILON: f64 = 1e-7;

/// Loss weights for the negative (label 0) and positive (label 1) class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    pub negative: f32,
    pub positive: f32,
}

impl Default for ClassWeights {
    fn default() -> Self {
        ClassWeights {
            negative: 1.0,
            positive: 1.0,
        }
    }
}

impl ClassWeights {
    pub fn new(negative: f32, positive: f32) -> Self {
        ClassWeights { negative, positive }
    }

    /// Both weights must be finite and non-negative
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("negative", self.negative), ("positive", self.positive)] {
            if !w.is_finite() || w < 0.0 {
                return Err(ClassifierError::Config(format!(
                    "{} class weight must be finite and >= 0, got {}",
                    name, w
                )));
            }
        }
        Ok(())
    }
}

/// Flatten a tensor with shape `[n, 1, ..., 1]` to `[n]`.
///
/// Any trailing dimension other than 1 is a `DimensionMismatch`.
pub fn squeeze_trailing<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
    context: &str,
) -> Result<Tensor<B, 1>> {
    let dims = tensor.dims();
    let n = dims[0];
    if let Some(extra) = dims.iter().skip(1).find(|d| **d != 1) {
        return Err(ClassifierError::DimensionMismatch {
            context: format!("trailing dimension of {}", context),
            expected: 1,
            actual: *extra,
        });
    }
    Ok(tensor.reshape([n]))
}

/// Squeeze predictions and targets and check they hold the same number of samples
pub(crate) fn squeeze_pair<B: Backend, const D1: usize, const D2: usize>(
    output: Tensor<B, D1>,
    target: Tensor<B, D2>,
) -> Result<(Tensor<B, 1>, Tensor<B, 1>)> {
    let output = squeeze_trailing(output, "predictions")?;
    let target = squeeze_trailing(target, "targets")?;

    let [n] = output.dims();
    let [m] = target.dims();
    if n != m {
        return Err(ClassifierError::DimensionMismatch {
            context: "predictions vs targets".to_string(),
            expected: n,
            actual: m,
        });
    }
    if n == 0 {
        return Err(ClassifierError::EmptyDataset(
            "cannot score an empty batch".to_string(),
        ));
    }
    Ok((output, target))
}

/// Mean class-weighted binary cross-entropy.
///
/// Each sample is weighted by `target * positive + (1 - target) * negative`,
/// so `ClassWeights::default()` gives plain BCE.
pub fn binary_loss<B: Backend, const D1: usize, const D2: usize>(
    output: Tensor<B, D1>,
    target: Tensor<B, D2>,
    weights: ClassWeights,
) -> Result<Tensor<B, 1>> {
    let (output, target) = squeeze_pair(output, target)?;

    let probs = output.clamp(EPSILON, 1.0 - EPSILON);
    let sample_weights =
        target.clone() * weights.positive + (target.clone().neg() + 1.0) * weights.negative;

    let bce = target.clone().neg() * probs.clone().log()
        - (target.neg() + 1.0) * (probs.neg() + 1.0).log();

    Ok((bce * sample_weights).mean())
}
