//! Training metrics and evaluation

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::dataset::tensor_to_vec;
use crate::training::loss::squeeze_pair;
use crate::Result;

/// Predictions at or above this probability count as the positive class
pub const THRESHOLD: f32 = 0.5;

/// Validation loss must drop below this fraction of the loss `window` epochs
/// back for training to continue
pub const IMPROVEMENT_FACTOR: f64 = 0.999;

/// Fraction of samples whose thresholded prediction equals the target
pub fn binary_accuracy<B: Backend, const D1: usize, const D2: usize>(
    output: Tensor<B, D1>,
    target: Tensor<B, D2>,
) -> Result<f64> {
    let (output, target) = squeeze_pair(output, target)?;

    let probs = tensor_to_vec(output)?;
    let targets = tensor_to_vec(target)?;

    let correct = probs
        .iter()
        .zip(targets.iter())
        .filter(|(p, t)| (**p >= THRESHOLD) == (**t >= THRESHOLD))
        .count();

    Ok(correct as f64 / probs.len() as f64)
}

/// Loss and accuracy accumulated over the batches of one pass
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Sum of per-batch mean losses
    pub loss_sum: f64,
    /// Sum of per-batch accuracies
    pub accuracy_sum: f64,
    /// Number of batches accumulated
    pub batch_count: usize,
    /// Number of samples seen
    pub total_predictions: usize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update metrics with a batch result
    pub fn update(&mut self, loss: f64, accuracy: f64, batch_size: usize) {
        self.loss_sum += loss;
        self.accuracy_sum += accuracy;
        self.batch_count += 1;
        self.total_predictions += batch_size;
    }

    /// Mean of per-batch losses
    pub fn avg_loss(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.loss_sum / self.batch_count as f64
        }
    }

    /// Mean of per-batch accuracies
    pub fn accuracy(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.accuracy_sum / self.batch_count as f64
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loss: {:.4} | Acc: {:.2}% ({} batches)",
            self.avg_loss(),
            self.accuracy() * 100.0,
            self.batch_count
        )
    }
}

/// The four scalars reported for one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub train_loss: f64,
    pub val_loss: f64,
    pub train_accuracy: f64,
    pub val_accuracy: f64,
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Train Loss: {:.4}, Val Loss: {:.4}, Train Accuracy: {:.4}, Val Accuracy: {:.4}",
            self.train_loss, self.val_loss, self.train_accuracy, self.val_accuracy
        )
    }
}

/// Training history for tracking progress
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub train_accuracies: Vec<f64>,
    pub val_accuracies: Vec<f64>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record metrics for an epoch
    pub fn record_epoch(&mut self, train: &Metrics, val: &Metrics) -> EpochMetrics {
        let epoch = EpochMetrics {
            train_loss: train.avg_loss(),
            val_loss: val.avg_loss(),
            train_accuracy: train.accuracy(),
            val_accuracy: val.accuracy(),
        };
        self.push(epoch);
        epoch
    }

    pub fn push(&mut self, epoch: EpochMetrics) {
        self.train_losses.push(epoch.train_loss);
        self.val_losses.push(epoch.val_loss);
        self.train_accuracies.push(epoch.train_accuracy);
        self.val_accuracies.push(epoch.val_accuracy);
    }

    /// Number of completed epochs
    pub fn len(&self) -> usize {
        self.val_losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.val_losses.is_empty()
    }

    /// Metrics of the most recent epoch
    pub fn last(&self) -> Option<EpochMetrics> {
        let n = self.len().checked_sub(1)?;
        Some(EpochMetrics {
            train_loss: self.train_losses[n],
            val_loss: self.val_losses[n],
            train_accuracy: self.train_accuracies[n],
            val_accuracy: self.val_accuracies[n],
        })
    }

    /// Epoch index (0-based) with the lowest validation loss
    pub fn best_epoch(&self) -> Option<usize> {
        self.val_losses
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }

    /// Check if we should early stop.
    ///
    /// Disabled when `window` is 0. Once the 0-based epoch index exceeds
    /// `window`, training stops unless the latest validation loss is below
    /// `IMPROVEMENT_FACTOR` times the loss recorded `window - 1` epochs
    /// earlier.
    pub fn should_early_stop(&self, window: usize) -> bool {
        if window == 0 {
            return false;
        }
        let n = self.val_losses.len();
        let Some(epoch) = n.checked_sub(1) else {
            return false;
        };
        if epoch <= window {
            return false;
        }
        let older = self.val_losses[n - window];
        let current = self.val_losses[n - 1];
        current > older * IMPROVEMENT_FACTOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    /// Feed losses one epoch at a time and return how many epochs ran
    fn epochs_until_stop(val_losses: &[f64], window: usize) -> usize {
        let mut history = TrainingHistory::new();
        for (i, loss) in val_losses.iter().enumerate() {
            history.push(EpochMetrics {
                train_loss: *loss,
                val_loss: *loss,
                train_accuracy: 0.5,
                val_accuracy: 0.5,
            });
            if history.should_early_stop(window) {
                return i + 1;
            }
        }
        val_losses.len()
    }

    #[test]
    fn test_accuracy() {
        let device = Default::default();
        let output = Tensor::<TestBackend, 2>::from_floats([[0.9], [0.4], [0.5], [0.1]], &device);
        let target = Tensor::<TestBackend, 1>::from_floats([1.0, 1.0, 1.0, 0.0], &device);

        let acc = binary_accuracy(output, target).unwrap();
        assert!((acc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_accuracy_invariant_under_joint_permutation() {
        let device = Default::default();
        let probs = [0.9f32, 0.2, 0.7, 0.45, 0.51, 0.05];
        let targets = [1.0f32, 1.0, 0.0, 0.0, 1.0, 0.0];
        let perm = [4, 2, 0, 5, 1, 3];

        let permuted_probs: Vec<f32> = perm.iter().map(|&i| probs[i]).collect();
        let permuted_targets: Vec<f32> = perm.iter().map(|&i| targets[i]).collect();

        let a = binary_accuracy(
            Tensor::<TestBackend, 1>::from_floats(probs, &device),
            Tensor::<TestBackend, 1>::from_floats(targets, &device),
        )
        .unwrap();
        let b = binary_accuracy(
            Tensor::<TestBackend, 1>::from_floats(permuted_probs.as_slice(), &device),
            Tensor::<TestBackend, 1>::from_floats(permuted_targets.as_slice(), &device),
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_accuracy_shape_mismatch() {
        let device = Default::default();
        let output = Tensor::<TestBackend, 1>::from_floats([0.9, 0.1], &device);
        let target = Tensor::<TestBackend, 1>::from_floats([1.0], &device);
        assert!(binary_accuracy(output, target).is_err());
    }

    #[test]
    fn test_metrics_average_over_batches() {
        let mut metrics = Metrics::new();
        metrics.update(0.6, 0.5, 16);
        metrics.update(0.2, 1.0, 4);

        assert!((metrics.avg_loss() - 0.4).abs() < 1e-12);
        assert!((metrics.accuracy() - 0.75).abs() < 1e-12);
        assert_eq!(metrics.total_predictions, 20);
        assert_eq!(metrics.batch_count, 2);
    }

    #[test]
    fn test_constant_losses_stop_at_window_plus_two() {
        for window in 1..6 {
            let losses = vec![1.0; 50];
            assert_eq!(epochs_until_stop(&losses, window), window + 2);
        }
    }

    #[test]
    fn test_decreasing_losses_run_all_epochs() {
        let losses: Vec<f64> = (0..60).map(|e| 1.0 / (1.0 + e as f64)).collect();
        assert_eq!(epochs_until_stop(&losses, 3), 60);

        let linear: Vec<f64> = (0..40).map(|e| 10.0 - 0.2 * e as f64).collect();
        assert_eq!(epochs_until_stop(&linear, 5), 40);
    }

    #[test]
    fn test_early_stopping_disabled() {
        let losses = vec![1.0; 20];
        assert_eq!(epochs_until_stop(&losses, 0), 20);
    }

    #[test]
    fn test_rising_losses_stop() {
        let losses: Vec<f64> = (0..30).map(|e| 1.0 + 0.1 * e as f64).collect();
        assert_eq!(epochs_until_stop(&losses, 2), 4);
    }

    #[test]
    fn test_history_last_and_best() {
        let mut history = TrainingHistory::new();
        assert!(history.last().is_none());

        let train = {
            let mut m = Metrics::new();
            m.update(0.5, 0.8, 10);
            m
        };
        let mut val = Metrics::new();
        val.update(0.7, 0.6, 10);
        history.record_epoch(&train, &val);
        let mut val = Metrics::new();
        val.update(0.3, 0.9, 10);
        let last = history.record_epoch(&train, &val);

        assert_eq!(history.len(), 2);
        assert_eq!(history.last(), Some(last));
        assert_eq!(history.best_epoch(), Some(1));
        assert!((last.val_accuracy - 0.9).abs() < 1e-12);
    }
}
