use std::{fmt, io::Read};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::batch::{validate_shape, Batch, Label, Position};
use crate::error::{DatasetError, Result};

/// A sparse, incrementally growing multi-class confusion matrix.
///
/// `matrix[actual][predicted]` holds the number of positions where `actual` was
/// the true label and `predicted` the model output. Cells, rows and labels only
/// exist once observed; counts never decrease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Sparse counts, rows in first-observed order.
    matrix: IndexMap<Label, IndexMap<Label, usize>>,
    /// Every actual label observed so far.
    row_labels: IndexSet<Label>,
    /// Every predicted label observed so far.
    col_labels: IndexSet<Label>,
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single (predicted, actual) observation.
    pub fn insert_prediction(&mut self, predicted: Label, actual: Label) {
        self.add_count(predicted, actual, 1);
    }

    fn add_count(&mut self, predicted: Label, actual: Label, count: usize) {
        *self
            .matrix
            .entry(actual)
            .or_default()
            .entry(predicted)
            .or_insert(0) += count;
        self.row_labels.insert(actual);
        self.col_labels.insert(predicted);
    }

    /// Accumulates a padded batch of predicted/actual sequences.
    ///
    /// Only the first `sizes[i]` positions of row `i` are counted. Empty input is
    /// a no-op. The shape of the whole batch is checked before anything is
    /// recorded, so a rejected batch leaves the matrix untouched.
    pub fn update<R: AsRef<[Position]>>(
        &mut self,
        predictions: &[R],
        labels: &[R],
        sizes: &[usize],
    ) -> Result<()> {
        if predictions.is_empty() || labels.is_empty() || sizes.is_empty() {
            return Ok(());
        }
        validate_shape(predictions, labels, sizes)?;

        // Step through time first, the way a recurrent model emits its outputs.
        let steps = sizes.iter().copied().max().unwrap_or(0);
        let mut inserted = 0usize;
        let mut skipped = 0usize;
        for step in 0..steps {
            for ((predicted, actual), _) in predictions
                .iter()
                .zip(labels)
                .zip(sizes)
                .filter(|(_, size)| step < **size)
            {
                match (predicted.as_ref()[step].label(), actual.as_ref()[step].label()) {
                    (Some(p), Some(a)) => {
                        self.insert_prediction(p, a);
                        inserted += 1;
                    }
                    _ => skipped += 1,
                }
            }
        }

        tracing::debug!(
            rows = sizes.len(),
            inserted,
            skipped,
            labels = self.label_count(),
            "confusion matrix updated"
        );
        Ok(())
    }

    #[inline]
    pub fn update_batch(&mut self, batch: &Batch) -> Result<()> {
        self.update(&batch.predictions, &batch.labels, &batch.sizes)
    }

    /// Adds every count of `other` into this matrix.
    pub fn merge(&mut self, other: &ConfusionMatrix) {
        for (&actual, row) in &other.matrix {
            for (&predicted, &count) in row {
                self.add_count(predicted, actual, count);
            }
        }
    }

    /// Sorted union of row and column labels.
    pub fn labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self
            .row_labels
            .iter()
            .chain(self.col_labels.iter())
            .copied()
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    fn label_count(&self) -> usize {
        self.row_labels.union(&self.col_labels).count()
    }

    /// Dense `|L| x |L|` export over the sorted label union.
    ///
    /// Returns an empty vector when nothing has been observed.
    pub fn to_array(&self) -> Vec<Vec<usize>> {
        let labels = self.labels();
        labels
            .iter()
            .map(|&actual| {
                labels
                    .iter()
                    .map(|&predicted| self.get(actual, predicted))
                    .collect()
            })
            .collect()
    }

    #[inline]
    pub fn row_labels(&self) -> &IndexSet<Label> {
        &self.row_labels
    }

    #[inline]
    pub fn col_labels(&self) -> &IndexSet<Label> {
        &self.col_labels
    }

    /// The sparse row for `actual`, columns in first-observed order.
    pub fn row(&self, actual: Label) -> Option<&IndexMap<Label, usize>> {
        self.matrix.get(&actual)
    }

    /// Count at (actual, predicted), 0 if never observed.
    pub fn get(&self, actual: Label, predicted: Label) -> usize {
        self.matrix
            .get(&actual)
            .and_then(|row| row.get(&predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    /// Total number of recorded observations.
    pub fn total(&self) -> usize {
        self.matrix.values().flat_map(|row| row.values()).sum()
    }

    pub fn true_positives(&self, label: Label) -> usize {
        self.get(label, label)
    }

    /// Number of observations whose actual label is `label` (row sum).
    pub fn actual_support(&self, label: Label) -> usize {
        self.matrix
            .get(&label)
            .map_or(0, |row| row.values().sum())
    }

    /// Number of observations predicted as `label` (column sum).
    pub fn predicted_support(&self, label: Label) -> usize {
        self.matrix
            .values()
            .filter_map(|row| row.get(&label))
            .sum()
    }

    /// Loads a matrix previously written by [`ConfusionMatrix::save_to_file`].
    pub fn load_from_file(file: &mut dyn Read) -> Result<Self, DatasetError> {
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)?;
        let cm: Self = serde_json::from_str(&buffer)?;
        cm.check_consistency()?;
        Ok(cm)
    }

    /// Saves the matrix as JSON.
    pub fn save_to_file(&self, file: &mut dyn std::io::Write) -> Result<(), DatasetError> {
        let serialized = serde_json::to_string(self)?;
        file.write_all(serialized.as_bytes())?;
        Ok(())
    }

    fn check_consistency(&self) -> Result<(), DatasetError> {
        for (actual, row) in &self.matrix {
            if !self.row_labels.contains(actual) {
                return Err(DatasetError::CorruptMatrix(format!(
                    "row {actual} missing from row labels"
                )));
            }
            if row.is_empty() {
                return Err(DatasetError::CorruptMatrix(format!("row {actual} is empty")));
            }
            for (predicted, &count) in row {
                if !self.col_labels.contains(predicted) {
                    return Err(DatasetError::CorruptMatrix(format!(
                        "column {predicted} missing from column labels"
                    )));
                }
                if count == 0 {
                    return Err(DatasetError::CorruptMatrix(format!(
                        "cell ({actual}, {predicted}) has a zero count"
                    )));
                }
            }
        }

        if let Some(actual) = self.row_labels.iter().find(|l| !self.matrix.contains_key(*l)) {
            return Err(DatasetError::CorruptMatrix(format!(
                "row label {actual} has no observations"
            )));
        }
        if let Some(predicted) = self
            .col_labels
            .iter()
            .find(|l| !self.matrix.values().any(|row| row.contains_key(*l)))
        {
            return Err(DatasetError::CorruptMatrix(format!(
                "column label {predicted} has no observations"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.labels();
        let dense = self.to_array();

        write!(f, "{:>10}", "")?;
        for label in &labels {
            write!(f, " {:>8}", format!("Pred {label}"))?;
        }
        writeln!(f)?;

        for (label, row) in labels.iter().zip(&dense) {
            write!(f, "{:>10}", format!("True {label}"))?;
            for count in row {
                write!(f, " {count:>8}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
