//! CSV record sink
//!
//! Writes one row per record to an append-only CSV file. An existing file is
//! reopened for append, never truncated; the header is written through
//! [`RecordSink::initialize`] only when the file holds nothing yet.

use crate::output::traits::{OutputResult, RecordSink};
use crate::record::Record;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Column names of the dataset
pub const CSV_HEADER: [&str; 5] = ["page", "title", "size", "download_link", "magnet"];

/// Append-only CSV dataset
pub struct CsvRecordSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    has_content: bool,
}

impl CsvRecordSink {
    /// Opens the dataset for append, creating an empty file if needed
    ///
    /// # Returns
    ///
    /// * `Ok(CsvRecordSink)` - The sink, positioned at the end of the file
    /// * `Err(OutputError)` - The file could not be created or opened
    pub fn open(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let has_content = file.metadata()?.len() > 0;

        if has_content {
            tracing::info!("CSV file '{}' already exists", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(file),
            has_content,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvRecordSink {
    fn exists(&self) -> bool {
        self.has_content
    }

    fn initialize(&mut self) -> OutputResult<()> {
        self.writer.write_record(CSV_HEADER)?;
        self.writer.flush()?;
        self.has_content = true;
        tracing::info!("Initialized new CSV file '{}'", self.path.display());
        Ok(())
    }

    fn append(&mut self, record: &Record) -> OutputResult<()> {
        self.writer.write_record([
            record.page_number.to_string().as_str(),
            record.title.as_str(),
            record.size.as_str(),
            record.resource_url.as_str(),
            record.magnet_link().as_str(),
        ])?;
        self.has_content = true;
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
