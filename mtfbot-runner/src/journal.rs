//! Append-only CSV journal of OPEN and CLOSE decisions.
//!
//! The header row is written once, when the file is created (or found
//! empty). Column order is the field order of `DecisionRecord`. A row whose
//! `event_id` matches the last row already in the file is skipped, so a
//! cycle replayed after a failed state save does not journal twice.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use mtfbot_core::decision::DecisionRecord;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("journal CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> JournalError {
        JournalError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn needs_header(&self) -> Result<bool, JournalError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// `event_id` of the last row, `None` for a missing or empty journal.
    pub fn last_event_id(&self) -> Result<Option<String>, JournalError> {
        if self.needs_header()? {
            return Ok(None);
        }
        let mut rdr = csv::Reader::from_path(&self.path)?;
        let Some(column) = rdr.headers()?.iter().position(|h| h == "event_id") else {
            return Ok(None);
        };
        let mut last = None;
        for row in rdr.records() {
            last = row?.get(column).map(str::to_string);
        }
        Ok(last)
    }

    /// Append one row, creating the file and its directory if needed.
    ///
    /// Returns `false` without writing when the last row already carries
    /// `record.event_id`.
    pub fn append(&self, record: &DecisionRecord) -> Result<bool, JournalError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        if self.last_event_id()?.as_deref() == Some(record.event_id.as_str()) {
            debug!(event_id = %record.event_id, "journal row already present");
            return Ok(false);
        }
        let header = self.needs_header()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(header)
            .from_writer(file);
        wtr.serialize(record)?;
        let mut file = wtr.into_inner().map_err(|e| self.io_err(e.into_error()))?;
        file.flush().map_err(|e| self.io_err(e))?;

        debug!(path = %self.path.display(), event_id = %record.event_id, "journal row appended");
        Ok(true)
    }

    /// All rows, oldest first. A missing file is an empty journal.
    pub fn read_all(&self) -> Result<Vec<DecisionRecord>, JournalError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for row in rdr.deserialize() {
            rows.push(row?);
        }
        Ok(rows)
    }
}
