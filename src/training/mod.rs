//! Model training
//!
//! Training loop, loss functions, and metrics tracking.

pub mod loss;
pub mod metrics;
pub mod plot;
pub mod trainer;

pub use loss::{binary_loss, ClassWeights};
pub use metrics::{binary_accuracy, EpochMetrics, Metrics, TrainingHistory};
pub use trainer::{score_epoch, FitOptions, Trainer};
