//! Storage backends
//!
//! The pipeline only needs to create an artifact for writing, read one back
//! whole, and render a location for logs. Object stores implement the same
//! contract.

use super::StorageError;
use bytes::Bytes;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Narrow read/write contract over artifact paths like
/// `markets/snapshot_date=2025-01-01/data.parquet`
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open `path` for writing, replacing any previous artifact
    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>, StorageError>;

    /// Read an artifact fully
    fn read(&self, path: &str) -> Result<Bytes, StorageError>;

    fn exists(&self, path: &str) -> bool;

    /// Human-readable location of `path`
    fn uri(&self, path: &str) -> String;
}

/// Artifacts as files under a root directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for LocalStorage {
    fn create(&self, path: &str) -> Result<Box<dyn Write + Send>, StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(path, e))?;
        }

        let file = File::create(&full).map_err(|e| StorageError::io(path, e))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let full = self.resolve(path);
        match fs::read(&full) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(self.uri(path)))
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn uri(&self, path: &str) -> String {
        self.resolve(path).display().to_string()
    }
}
