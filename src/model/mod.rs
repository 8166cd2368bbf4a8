//! Neural network architecture
//!
//! A fixed-topology feed-forward classifier built as an ordered pipeline of
//! stages, plus the initialisation policy it is constructed and reset with.

pub mod classifier;
pub mod init;

pub use classifier::{Classifier, ClassifierConfig, HIDDEN_SIZES};
