//! Data ingestion and batching
//!
//! CSV loading, the dataset wrapper consumed by burn's data loader, and
//! feature preprocessing.

pub mod csv;
pub mod dataset;
pub mod preprocess;

pub use dataset::{ClassificationBatch, ClassificationBatcher, ClassificationDataset, Sample};
pub use preprocess::{FeatureTransform, Identity, Preprocess, Standardize};
