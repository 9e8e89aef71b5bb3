use std::fmt;

use serde::{Deserialize, Serialize};

use super::confusion::ConfusionMatrix;
use crate::batch::Label;

/// Summary scores derived from a confusion matrix snapshot.
///
/// All four fields lie in `[0, 1]`; a matrix without observations yields zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Correct observations over all observations.
    pub accuracy: f64,
    /// Unweighted mean over labels of TP / actual support.
    pub precision: f64,
    /// Unweighted mean over labels of TP / predicted support.
    pub recall: f64,
    /// Harmonic mean of `precision` and `recall`.
    pub f1_score: f64,
}

impl PerformanceMetrics {
    pub fn new(accuracy: f64, precision: f64, recall: f64, f1_score: f64) -> Self {
        Self {
            accuracy,
            precision,
            recall,
            f1_score,
        }
    }
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy={:.4} precision={:.4} recall={:.4} f1={:.4}",
            self.accuracy, self.precision, self.recall, self.f1_score
        )
    }
}

/// Per-label counts and scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub label: Label,
    pub true_positives: usize,
    /// Row sum: observations whose actual label is `label`.
    pub actual_support: usize,
    /// Column sum: observations predicted as `label`.
    pub predicted_support: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

#[inline]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[inline]
fn harmonic_mean(a: f64, b: f64) -> f64 {
    if a + b > 0.0 {
        2.0 * a * b / (a + b)
    } else {
        0.0
    }
}

impl ConfusionMatrix {
    /// Per-label breakdown over the sorted label union.
    pub fn class_stats(&self) -> Vec<ClassStats> {
        self.labels()
            .into_iter()
            .map(|label| {
                let true_positives = self.true_positives(label);
                let actual_support = self.actual_support(label);
                let predicted_support = self.predicted_support(label);
                let precision = ratio(true_positives, actual_support);
                let recall = ratio(true_positives, predicted_support);

                ClassStats {
                    label,
                    true_positives,
                    actual_support,
                    predicted_support,
                    precision,
                    recall,
                    f1_score: harmonic_mean(precision, recall),
                }
            })
            .collect()
    }

    /// Computes accuracy, macro precision/recall and their F1 from the current counts.
    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let stats = self.class_stats();
        if stats.is_empty() {
            tracing::trace!("performance metrics requested on an empty confusion matrix");
            return PerformanceMetrics::default();
        }

        let n_labels = stats.len() as f64;
        let correct: usize = stats.iter().map(|s| s.true_positives).sum();
        let accuracy = ratio(correct, self.total());
        let precision = stats.iter().map(|s| s.precision).sum::<f64>() / n_labels;
        let recall = stats.iter().map(|s| s.recall).sum::<f64>() / n_labels;

        PerformanceMetrics::new(accuracy, precision, recall, harmonic_mean(precision, recall))
    }
}

/// Renders the per-label table followed by the summary line.
pub fn class_report(cm: &ConfusionMatrix) -> String {
    let mut report = format!(
        "{:>8} {:>10} {:>10} {:>10} {:>8} {:>8}\n",
        "label", "precision", "recall", "f1-score", "actual", "pred"
    );
    report.push_str(&"-".repeat(59));
    report.push('\n');

    for s in cm.class_stats() {
        report.push_str(&format!(
            "{:>8} {:>10.4} {:>10.4} {:>10.4} {:>8} {:>8}\n",
            s.label, s.precision, s.recall, s.f1_score, s.actual_support, s.predicted_support
        ));
    }

    report.push_str(&"-".repeat(59));
    report.push('\n');
    report.push_str(&cm.performance_metrics().to_string());
    report.push('\n');
    report
}
