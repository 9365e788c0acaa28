//! Columnar artifact storage
//!
//! Parquet schemas for each record type, a page-at-a-time writer, a
//! batch-wise reader, and the backend contract they write through.

mod backend;
mod paths;
mod reader;
mod schema;
mod writer;

pub use backend::{LocalStorage, Storage};
pub use paths::{snapshot_date, ArtifactPaths};
pub use reader::{read_all, RecordReader};
pub use schema::{events_schema, markets_schema, trades_schema, Record};
pub use writer::{write_pages, write_records, StreamingWriter, WriteSummary};

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("schema mismatch: {0}")]
    Schema(String),

    #[error("artifact not found: {0}")]
    NotFound(String),
}

impl StorageError {
    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}
