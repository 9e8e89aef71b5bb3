//! Performance accounting for sequence classifiers.
//!
//! Padded batches of predicted and actual label sequences are accumulated into a
//! sparse [`ConfusionMatrix`], which can be exported densely or summarised as
//! [`PerformanceMetrics`].

pub mod batch;
pub mod dataset;
pub mod error;
pub mod metrics;

pub use batch::{Batch, Label, Position};
pub use error::{BatchError, DatasetError};
pub use metrics::{class_report, ClassStats, ConfusionMatrix, PerformanceMetrics};
