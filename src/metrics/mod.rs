//! Sequence classification metrics
//!
//! A sparse confusion matrix fed with padded batches of label sequences, and the
//! accuracy / precision / recall / F1 summary derived from it.

mod confusion;
mod performance;

pub use confusion::ConfusionMatrix;
pub use performance::{class_report, ClassStats, PerformanceMetrics};
