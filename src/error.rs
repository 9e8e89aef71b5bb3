use thiserror::Error;

/// Errors raised when a padded batch violates its shape contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch row counts differ: {predictions} prediction rows, {labels} label rows, {sizes} sizes")]
    RowCountMismatch {
        predictions: usize,
        labels: usize,
        sizes: usize,
    },

    #[error("row {row}: prediction width {predictions} does not match label width {labels}")]
    WidthMismatch {
        row: usize,
        predictions: usize,
        labels: usize,
    },

    #[error("row {row}: size {size} exceeds padded width {width}")]
    SizeOutOfRange { row: usize, size: usize, width: usize },

    #[error("invalid label {value} (pad sentinel is {pad})")]
    InvalidLabel { value: i64, pad: i64 },
}

/// Errors raised while loading batches or saved matrices.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("invalid batch: {0}")]
    Batch(#[from] BatchError),

    #[error("invalid sequence size {0}")]
    InvalidSize(i64),

    #[error("unsupported dataset format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt confusion matrix: {0}")]
    CorruptMatrix(String),
}

pub type Result<T, E = BatchError> = std::result::Result<T, E>;
