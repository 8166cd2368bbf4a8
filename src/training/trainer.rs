//! Training loop: optimisation pass, validation scoring, train rescoring and
//! early stopping

use std::path::PathBuf;

use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::Dataset;
use burn::module::{AutodiffModule, Module};
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};

use crate::data::dataset::{ClassificationBatch, ClassificationBatcher, ClassificationDataset};
use crate::data::preprocess::Preprocess;
use crate::model::Classifier;
use crate::training::loss::{binary_loss, ClassWeights};
use crate::training::metrics::{binary_accuracy, EpochMetrics, Metrics, TrainingHistory};
use crate::training::plot;
use crate::{ClassifierError, Config, Result};

/// Options for a single `fit` call
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub num_epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Log a progress line every this many epochs, 0 for never
    pub print_every: usize,
    /// Early stopping window in epochs, 0 disables it
    pub early_stopping: usize,
    pub loss_weight: ClassWeights,
    /// Seed for the per-epoch shuffle of the training set
    pub seed: u64,
    /// Write loss/accuracy curves to this SVG file when training ends
    pub plot: Option<PathBuf>,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            num_epochs: 100,
            batch_size: 32,
            learning_rate: 1e-3,
            print_every: 10,
            early_stopping: 0,
            loss_weight: ClassWeights::default(),
            seed: 42,
            plot: None,
        }
    }
}

impl FitOptions {
    pub fn from_config(config: &Config) -> Self {
        FitOptions {
            num_epochs: config.training.epochs,
            batch_size: config.training.batch_size,
            learning_rate: config.training.learning_rate,
            print_every: config.training.print_every,
            early_stopping: config.training.early_stopping,
            loss_weight: ClassWeights::new(
                config.loss.weight_negative,
                config.loss.weight_positive,
            ),
            seed: config.training.seed,
            plot: config.data.plot_path.as_ref().map(PathBuf::from),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_epochs == 0 {
            return Err(ClassifierError::Config(
                "num_epochs must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ClassifierError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return Err(ClassifierError::Config(format!(
                "learning_rate must be finite and >= 0, got {}",
                self.learning_rate
            )));
        }
        self.loss_weight.validate()
    }
}

/// Trainer for the classifier.
///
/// Owns the network and the optimizer state for the duration of training;
/// parameters only change through the optimizer step.
pub struct Trainer<B: AutodiffBackend, O: Optimizer<Classifier<B>, B>> {
    model: Classifier<B>,
    optimizer: O,
    options: FitOptions,
    device: B::Device,
    history: TrainingHistory,
}

impl<B, O> Trainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Classifier<B>, B>,
{
    /// Create a new trainer, placing the network on `device`
    pub fn new(model: Classifier<B>, optimizer: O, options: FitOptions, device: B::Device) -> Self {
        let model = model.fork(&device);
        Trainer {
            model,
            optimizer,
            options,
            device,
            history: TrainingHistory::new(),
        }
    }

    /// Train from feature/label tensors.
    ///
    /// Label tensors may be `[n]` or `[n, 1, ...]`. A sample-count mismatch
    /// between features and labels is a `DimensionMismatch`.
    pub fn fit_tensors<TB, P, const D1: usize, const D2: usize>(
        &mut self,
        train_features: Tensor<TB, 2>,
        train_labels: Tensor<TB, D1>,
        val_features: Tensor<TB, 2>,
        val_labels: Tensor<TB, D2>,
        preprocess: &P,
    ) -> Result<EpochMetrics>
    where
        TB: Backend,
        P: Preprocess,
    {
        let train = ClassificationDataset::from_tensors(train_features, train_labels)?;
        let val = ClassificationDataset::from_tensors(val_features, val_labels)?;
        self.fit(train, val, preprocess)
    }

    /// Train the model.
    ///
    /// Each epoch runs one optimisation pass over a freshly shuffled training
    /// set, then scores the validation set and re-scores the training set in
    /// evaluation mode. Returns the metrics of the last completed epoch.
    pub fn fit<P: Preprocess>(
        &mut self,
        train: ClassificationDataset,
        val: ClassificationDataset,
        preprocess: &P,
    ) -> Result<EpochMetrics> {
        self.options.validate()?;
        self.check_dataset("training", &train)?;
        self.check_dataset("validation", &val)?;

        let batch_size = self.options.batch_size;
        let num_epochs = self.options.num_epochs;
        let loss_weight = self.options.loss_weight;

        log::info!(
            "Training on {} samples ({:.1}% positive), validating on {} samples",
            train.len(),
            train.positive_rate() * 100.0,
            val.len()
        );

        // Optimisation pass reshuffles every epoch; scoring passes keep file order
        let train_loader =
            DataLoaderBuilder::new(ClassificationBatcher::<B>::new(self.device.clone()))
                .batch_size(batch_size)
                .shuffle(self.options.seed)
                .build(train.clone());

        let rescore_loader = DataLoaderBuilder::new(
            ClassificationBatcher::<B::InnerBackend>::new(self.device.clone()),
        )
        .batch_size(batch_size)
        .build(train);

        let val_loader = DataLoaderBuilder::new(
            ClassificationBatcher::<B::InnerBackend>::new(self.device.clone()),
        )
        .batch_size(batch_size)
        .build(val);

        self.history = TrainingHistory::new();

        log::info!("Starting training for {} epochs", num_epochs);

        for epoch in 0..num_epochs {
            // Training phase
            let step_metrics = self.train_epoch(train_loader.iter(), preprocess)?;
            log::debug!("Epoch {} optimisation pass: {}", epoch + 1, step_metrics);

            // Scoring phases run without gradient tracking, normalisation frozen
            let model = self.model.valid();
            let val_metrics = score_epoch(&model, val_loader.iter(), preprocess, loss_weight)?;
            let train_metrics =
                score_epoch(&model, rescore_loader.iter(), preprocess, loss_weight)?;

            let metrics = self.history.record_epoch(&train_metrics, &val_metrics);

            if self.options.print_every > 0 && (epoch + 1) % self.options.print_every == 0 {
                log::info!("Epoch {}/{}: {}", epoch + 1, num_epochs, metrics);
            }

            if self.history.should_early_stop(self.options.early_stopping) {
                log::info!("Early stopping at epoch {}", epoch + 1);
                break;
            }
        }

        if let Some(path) = &self.options.plot {
            plot::render_history(&self.history, path)?;
        }

        self.history.last().ok_or_else(|| {
            ClassifierError::EmptyDataset("no epochs were completed".to_string())
        })
    }

    /// Train one epoch
    fn train_epoch<P: Preprocess>(
        &mut self,
        loader: impl Iterator<Item = ClassificationBatch<B>>,
        preprocess: &P,
    ) -> Result<Metrics> {
        let mut metrics = Metrics::new();

        for batch in loader {
            let batch_size = batch.len();
            let features = preprocess.apply(batch.features);

            // Forward pass
            let output = self.model.forward(features);

            // Compute loss
            let loss = binary_loss(
                output.clone(),
                batch.targets.clone(),
                self.options.loss_weight,
            )?;
            let loss_val: f64 = loss.clone().into_scalar().elem();

            // Backward pass
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);

            // Update weights
            self.model = self
                .optimizer
                .step(self.options.learning_rate, self.model.clone(), grads);

            let accuracy = binary_accuracy(output, batch.targets)?;
            metrics.update(loss_val, accuracy, batch_size);
        }

        Ok(metrics)
    }

    fn check_dataset(&self, name: &str, dataset: &ClassificationDataset) -> Result<()> {
        if dataset.is_empty() {
            return Err(ClassifierError::EmptyDataset(format!(
                "{} set has no samples",
                name
            )));
        }
        if dataset.feature_dim() != self.model.input_size() {
            return Err(ClassifierError::DimensionMismatch {
                context: format!("{} feature width vs network input", name),
                expected: self.model.input_size(),
                actual: dataset.feature_dim(),
            });
        }
        Ok(())
    }

    /// History of the most recent `fit` call
    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Get the current model
    pub fn model(&self) -> &Classifier<B> {
        &self.model
    }

    /// Get the model, consuming the trainer
    pub fn into_model(self) -> Classifier<B> {
        self.model
    }
}

/// Loss and accuracy over every batch of `loader`, without updating the model
pub fn score_epoch<B: Backend, P: Preprocess>(
    model: &Classifier<B>,
    loader: impl Iterator<Item = ClassificationBatch<B>>,
    preprocess: &P,
    loss_weight: ClassWeights,
) -> Result<Metrics> {
    let mut metrics = Metrics::new();

    for batch in loader {
        let batch_size = batch.len();
        let features = preprocess.apply(batch.features);

        let output = model.forward(features);
        let loss = binary_loss(output.clone(), batch.targets.clone(), loss_weight)?;
        let loss_val: f64 = loss.into_scalar().elem();
        let accuracy = binary_accuracy(output, batch.targets)?;

        metrics.update(loss_val, accuracy, batch_size);
    }

    Ok(metrics)
}
