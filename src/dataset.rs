use std::{fs::File, io::Read, path::Path};

use parquet::{
    file::{reader::FileReader, serialized_reader::SerializedFileReader},
    record::{List, ListAccessor, RowAccessor},
};
use serde::Deserialize;

use crate::batch::Batch;
use crate::error::DatasetError;

/// A batch as written by the evaluation loop: raw integers with a PAD sentinel.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBatch {
    pub predictions: Vec<Vec<i64>>,
    pub labels: Vec<Vec<i64>>,
    pub sizes: Vec<usize>,
}

impl RawBatch {
    pub fn into_batch(self, pad: i64) -> Result<Batch, DatasetError> {
        Ok(Batch::from_sentinel_rows(
            &self.predictions,
            &self.labels,
            &self.sizes,
            pad,
        )?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBatches {
    One(RawBatch),
    Many(Vec<RawBatch>),
}

/// Loads one batch object or an array of batch objects from JSON.
pub fn load_json(file: &mut dyn Read, pad: i64) -> Result<Vec<Batch>, DatasetError> {
    let mut buffer = String::new();
    file.read_to_string(&mut buffer)?;

    let raw = match serde_json::from_str(&buffer)? {
        RawBatches::One(batch) => vec![batch],
        RawBatches::Many(batches) => batches,
    };
    raw.into_iter().map(|batch| batch.into_batch(pad)).collect()
}

fn list_values(list: &List) -> Result<Vec<i64>, DatasetError> {
    (0..list.len())
        .map(|i| list.get_long(i).map_err(DatasetError::from))
        .collect()
}

/// Loads sequences from a parquet file with columns
/// `predictions: list<int64>`, `labels: list<int64>`, `size: int64`,
/// grouping consecutive rows into batches of `batch_size`.
pub fn load_parquet(file: File, pad: i64, batch_size: usize) -> Result<Vec<Batch>, DatasetError> {
    let batch_size = batch_size.max(1);
    let reader = SerializedFileReader::new(file)?;

    let mut batches = Vec::new();
    let mut current = RawBatch {
        predictions: Vec::with_capacity(batch_size),
        labels: Vec::with_capacity(batch_size),
        sizes: Vec::with_capacity(batch_size),
    };

    for row in reader.get_row_iter(None)? {
        let row = row?;
        let size = row.get_long(2)?;
        current.predictions.push(list_values(row.get_list(0)?)?);
        current.labels.push(list_values(row.get_list(1)?)?);
        current
            .sizes
            .push(usize::try_from(size).map_err(|_| DatasetError::InvalidSize(size))?);

        if current.sizes.len() == batch_size {
            let full = std::mem::replace(
                &mut current,
                RawBatch {
                    predictions: Vec::with_capacity(batch_size),
                    labels: Vec::with_capacity(batch_size),
                    sizes: Vec::with_capacity(batch_size),
                },
            );
            batches.push(full.into_batch(pad)?);
        }
    }

    if !current.sizes.is_empty() {
        batches.push(current.into_batch(pad)?);
    }

    tracing::debug!(batches = batches.len(), batch_size, "loaded parquet dataset");
    Ok(batches)
}

/// Loads batches from `path`, choosing the reader from the file extension.
pub fn load_path(path: &Path, pad: i64, batch_size: usize) -> Result<Vec<Batch>, DatasetError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match extension.as_str() {
        "json" => load_json(&mut File::open(path)?, pad),
        "parquet" => load_parquet(File::open(path)?, pad, batch_size),
        other => Err(DatasetError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Position;
    use crate::error::BatchError;
    use crate::metrics::ConfusionMatrix;
    use parquet::{
        data_type::Int64Type,
        file::{properties::WriterProperties, writer::SerializedFileWriter},
        schema::parser::parse_message_type,
    };
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    const SCHEMA: &str = "
        message sequences {
            REQUIRED GROUP predictions (LIST) {
                REPEATED GROUP list {
                    REQUIRED INT64 element;
                }
            }
            REQUIRED GROUP labels (LIST) {
                REPEATED GROUP list {
                    REQUIRED INT64 element;
                }
            }
            REQUIRED INT64 size;
        }
    ";

    type Sequence = (Vec<i64>, Vec<i64>, i64);

    /// Flattens non-empty lists into values plus definition and repetition levels.
    fn list_column<'a>(
        lists: impl Iterator<Item = &'a Vec<i64>>,
    ) -> (Vec<i64>, Vec<i16>, Vec<i16>) {
        let (mut values, mut def, mut rep) = (Vec::new(), Vec::new(), Vec::new());
        for list in lists {
            for (i, &value) in list.iter().enumerate() {
                values.push(value);
                def.push(1);
                rep.push(if i == 0 { 0 } else { 1 });
            }
        }
        (values, def, rep)
    }

    fn levels(levels: &[i16]) -> Option<&[i16]> {
        (!levels.is_empty()).then_some(levels)
    }

    fn write_parquet(rows: &[Sequence]) -> NamedTempFile {
        let file = tempfile::Builder::new()
            .suffix(".parquet")
            .tempfile()
            .unwrap();
        let schema = Arc::new(parse_message_type(SCHEMA).unwrap());
        let props = Arc::new(WriterProperties::builder().build());
        let mut writer = SerializedFileWriter::new(file.reopen().unwrap(), schema, props).unwrap();
        let mut row_group = writer.next_row_group().unwrap();

        let columns = [
            list_column(rows.iter().map(|row| &row.0)),
            list_column(rows.iter().map(|row| &row.1)),
            (rows.iter().map(|row| row.2).collect(), Vec::new(), Vec::new()),
        ];
        for (values, def, rep) in &columns {
            let mut column = row_group.next_column().unwrap().unwrap();
            column
                .typed::<Int64Type>()
                .write_batch(values, levels(def), levels(rep))
                .unwrap();
            column.close().unwrap();
        }

        row_group.close().unwrap();
        writer.close().unwrap();
        file
    }

    #[test]
    fn test_load_parquet_groups_rows_into_batches() {
        let file = write_parquet(&[
            (vec![0, 1, -1], vec![0, 1, -1], 2),
            (vec![2, -1, -1], vec![2, -1, -1], 1),
            (vec![3, 3, 3], vec![3, 3, 3], 3),
        ]);
        let batches = load_path(file.path(), -1, 2).unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].sizes, vec![2, 1]);
        assert_eq!(batches[1].sizes, vec![3]);
        assert_eq!(batches[0].predictions[0][2], Position::Pad);

        let mut cm = ConfusionMatrix::new();
        for batch in &batches {
            cm.update_batch(batch).unwrap();
        }
        assert_eq!(
            cm.to_array(),
            vec![
                vec![1, 0, 0, 0],
                vec![0, 1, 0, 0],
                vec![0, 0, 1, 0],
                vec![0, 0, 0, 3],
            ]
        );
    }

    #[test]
    fn test_load_parquet_rejects_negative_size() {
        let file = write_parquet(&[(vec![0, 1], vec![0, 1], -2)]);
        let err = load_parquet(file.reopen().unwrap(), -1, 4).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidSize(-2)));
    }

    #[test]
    fn test_load_single_json_batch() {
        let json = r#"{"predictions": [[0, 1, -1]], "labels": [[0, 2, -1]], "sizes": [2]}"#;
        let batches = load_json(&mut json.as_bytes(), -1).unwrap();

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].sizes, vec![2]);
        assert_eq!(batches[0].labels[0][2], Position::Pad);
    }

    #[test]
    fn test_load_json_batch_array() {
        let json = r#"[
            {"predictions": [[0]], "labels": [[0]], "sizes": [1]},
            {"predictions": [[3, 99]], "labels": [[1, 99]], "sizes": [1]}
        ]"#;
        let batches = load_json(&mut json.as_bytes(), 99).unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].predictions[0], vec![Position::Label(3), Position::Pad]);
    }

    #[test]
    fn test_load_json_rejects_negative_label() {
        let json = r#"{"predictions": [[-5]], "labels": [[0]], "sizes": [1]}"#;
        let err = load_json(&mut json.as_bytes(), -1).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::Batch(BatchError::InvalidLabel { value: -5, pad: -1 })
        ));
    }

    #[test]
    fn test_load_path_rejects_unknown_extension() {
        let err = load_path(Path::new("batches.csv"), -1, 8).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedFormat(ext) if ext == "csv"));
    }
}
