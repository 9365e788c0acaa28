//! Batch-wise artifact reader

use super::schema::Record;
use super::{Storage, StorageError};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use std::marker::PhantomData;

/// Rows decoded per batch when re-reading an artifact
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Iterates an artifact one decoded record batch at a time
pub struct RecordReader<R: Record> {
    batches: ParquetRecordBatchReader,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> RecordReader<R> {
    pub fn open(storage: &dyn Storage, path: &str) -> Result<Self, StorageError> {
        Self::with_batch_size(storage, path, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(
        storage: &dyn Storage,
        path: &str,
        batch_size: usize,
    ) -> Result<Self, StorageError> {
        let data = storage.read(path)?;
        let batches = ParquetRecordBatchReaderBuilder::try_new(data)?
            .with_batch_size(batch_size.max(1))
            .build()?;

        Ok(Self {
            batches,
            _record: PhantomData,
        })
    }
}

impl<R: Record> Iterator for RecordReader<R> {
    type Item = Result<Vec<R>, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = self.batches.next()?;
        Some(
            batch
                .map_err(StorageError::from)
                .and_then(|batch| R::from_batch(&batch)),
        )
    }
}

/// Read every record of an artifact into memory
pub fn read_all<R: Record>(storage: &dyn Storage, path: &str) -> Result<Vec<R>, StorageError> {
    let mut records = Vec::new();
    for batch in RecordReader::<R>::open(storage, path)? {
        records.extend(batch?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Market;
    use crate::storage::{write_records, LocalStorage};
    use tempfile::TempDir;

    fn markets(n: usize) -> Vec<Market> {
        (0..n)
            .map(|i| Market {
                ticker: format!("MKT-{}", i),
                event_ticker: "EVT".to_string(),
                close_time: Some("2025-01-01T00:00:00Z".to_string()),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_reads_in_batches() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        write_records(&storage, "m/data.parquet", &markets(10)).unwrap();

        let sizes: Vec<usize> = RecordReader::<Market>::with_batch_size(&storage, "m/data.parquet", 4)
            .unwrap()
            .map(|batch| batch.unwrap().len())
            .collect();

        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_read_all_preserves_order() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let written = markets(3);
        write_records(&storage, "m/data.parquet", &written).unwrap();

        let back: Vec<Market> = read_all(&storage, "m/data.parquet").unwrap();
        assert_eq!(back, written);
    }

    #[test]
    fn test_open_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());

        let result = RecordReader::<Market>::open(&storage, "nope/data.parquet");
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }
}
