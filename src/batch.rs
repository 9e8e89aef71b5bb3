use crate::error::{BatchError, Result};

/// A class identifier.
pub type Label = usize;

/// One slot of a fixed-width padded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Label(Label),
    Pad,
}

impl Position {
    /// Maps a raw integer slot to a position, treating `pad` as padding.
    pub fn from_sentinel(value: i64, pad: i64) -> Result<Self> {
        if value == pad {
            Ok(Position::Pad)
        } else {
            usize::try_from(value)
                .map(Position::Label)
                .map_err(|_| BatchError::InvalidLabel { value, pad })
        }
    }

    #[inline]
    pub fn label(self) -> Option<Label> {
        match self {
            Position::Label(label) => Some(label),
            Position::Pad => None,
        }
    }
}

impl From<Label> for Position {
    fn from(label: Label) -> Self {
        Position::Label(label)
    }
}

/// Converts a row of raw integers into positions.
pub fn row_from_sentinel(row: &[i64], pad: i64) -> Result<Vec<Position>> {
    row.iter()
        .map(|&value| Position::from_sentinel(value, pad))
        .collect()
}

/// A batch of padded predicted/actual sequences with their true lengths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    pub predictions: Vec<Vec<Position>>,
    pub labels: Vec<Vec<Position>>,
    pub sizes: Vec<usize>,
}

impl Batch {
    pub fn new(
        predictions: Vec<Vec<Position>>,
        labels: Vec<Vec<Position>>,
        sizes: Vec<usize>,
    ) -> Self {
        Self {
            predictions,
            labels,
            sizes,
        }
    }

    /// Builds a batch from raw integer rows that use `pad` as the padding sentinel.
    pub fn from_sentinel_rows(
        predictions: &[Vec<i64>],
        labels: &[Vec<i64>],
        sizes: &[usize],
        pad: i64,
    ) -> Result<Self> {
        let predictions = predictions
            .iter()
            .map(|row| row_from_sentinel(row, pad))
            .collect::<Result<Vec<_>>>()?;
        let labels = labels
            .iter()
            .map(|row| row_from_sentinel(row, pad))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(predictions, labels, sizes.to_vec()))
    }

    /// Number of sequences in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// A batch is empty when any of its three parts is.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty() || self.labels.is_empty() || self.sizes.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        validate_shape(&self.predictions, &self.labels, &self.sizes)
    }
}

/// Checks that every row pair has the same width and that each size fits in it.
pub(crate) fn validate_shape<R: AsRef<[Position]>>(
    predictions: &[R],
    labels: &[R],
    sizes: &[usize],
) -> Result<()> {
    if predictions.len() != labels.len() || labels.len() != sizes.len() {
        return Err(BatchError::RowCountMismatch {
            predictions: predictions.len(),
            labels: labels.len(),
            sizes: sizes.len(),
        });
    }

    for (row, ((predicted, actual), &size)) in predictions
        .iter()
        .zip(labels.iter())
        .zip(sizes.iter())
        .enumerate()
    {
        let (predicted, actual) = (predicted.as_ref(), actual.as_ref());
        if predicted.len() != actual.len() {
            return Err(BatchError::WidthMismatch {
                row,
                predictions: predicted.len(),
                labels: actual.len(),
            });
        }
        if size > predicted.len() {
            return Err(BatchError::SizeOutOfRange {
                row,
                size,
                width: predicted.len(),
            });
        }
    }

    Ok(())
}
