//! Parquet writers
//!
//! [`StreamingWriter`] appends one row group per page and flushes it
//! immediately, so at most one page of records is held at a time.
//! [`write_records`] writes an in-memory set as a single unit through the
//! same schema.

use super::schema::Record;
use super::{Storage, StorageError};
use crate::api::Page;
use futures_util::{Stream, StreamExt};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::io::Write;
use std::marker::PhantomData;

/// Outcome of a completed write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Artifact path relative to the storage root
    pub path: String,
    pub records: usize,
    pub pages: usize,
    /// Most records held in memory at once
    pub peak_page_records: usize,
}

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build()
}

/// Page-at-a-time Parquet writer for one record type
pub struct StreamingWriter<R: Record> {
    writer: ArrowWriter<Box<dyn Write + Send>>,
    summary: WriteSummary,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> StreamingWriter<R> {
    /// Open `path` on `storage` for writing
    pub fn create(storage: &dyn Storage, path: &str) -> Result<Self, StorageError> {
        let sink = storage.create(path)?;
        let writer = ArrowWriter::try_new(sink, R::schema(), Some(writer_properties()))?;

        tracing::debug!(kind = R::KIND, path = %storage.uri(path), "Opened streaming writer");

        Ok(Self {
            writer,
            summary: WriteSummary {
                path: path.to_string(),
                ..Default::default()
            },
            _record: PhantomData,
        })
    }

    /// Append one page and flush it as its own row group
    pub fn append_page(&mut self, records: &[R]) -> Result<(), StorageError> {
        self.summary.pages += 1;
        self.summary.peak_page_records = self.summary.peak_page_records.max(records.len());

        if records.is_empty() {
            return Ok(());
        }

        let batch = R::to_batch(records)?;
        self.writer.write(&batch)?;
        self.writer.flush()?;

        self.summary.records += records.len();
        metrics::counter!(crate::telemetry::RECORDS_WRITTEN, "kind" => R::KIND)
            .increment(records.len() as u64);

        Ok(())
    }

    /// Records written so far
    pub fn records_written(&self) -> usize {
        self.summary.records
    }

    /// Write the footer and close the artifact
    pub fn finish(self) -> Result<WriteSummary, StorageError> {
        self.writer.close()?;

        tracing::info!(
            kind = R::KIND,
            path = %self.summary.path,
            records = self.summary.records,
            pages = self.summary.pages,
            "Finished writing"
        );

        Ok(self.summary)
    }
}

/// Drain a stream of pages into `path`, one page in memory at a time
///
/// A stream error aborts the write; whatever was flushed before it stays in
/// the (unterminated) artifact.
pub async fn write_pages<R, E, S>(storage: &dyn Storage, path: &str, pages: S) -> Result<WriteSummary, E>
where
    R: Record,
    E: From<StorageError>,
    S: Stream<Item = Result<Page<R>, E>>,
{
    let mut writer = StreamingWriter::<R>::create(storage, path)?;
    let mut pages = std::pin::pin!(pages);

    while let Some(page) = pages.next().await {
        let page = page?;
        writer.append_page(&page.records)?;
    }

    Ok(writer.finish()?)
}

/// Write an in-memory record set as a single unit
pub fn write_records<R: Record>(
    storage: &dyn Storage,
    path: &str,
    records: &[R],
) -> Result<WriteSummary, StorageError> {
    let mut writer = StreamingWriter::<R>::create(storage, path)?;
    writer.append_page(records)?;
    writer.finish()
}
