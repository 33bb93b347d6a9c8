//! Append-only, newline-delimited event log
//!
//! Records are only ever appended, never rewritten. Queries replay the file
//! backwards so the newest record of interest is found first.

use crate::error::{TransferError, TransferResult};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A single append-only text log on disk
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// Creates a handle for the log at `path`; nothing is touched on disk
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the log file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Appends one record, creating the file if it is absent
    ///
    /// The record is written with a single `write_all` and synced before
    /// returning. If a previous write was torn and left the file without a
    /// trailing newline, a newline is written first so the new record starts
    /// on its own line.
    pub fn append(&self, record: &str) -> TransferResult<()> {
        if record.contains('\n') || record.contains('\r') {
            return Err(TransferError::Registry(format!(
                "record must be a single line: {:?}",
                record
            )));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| TransferError::io(&self.path, e))?;

        let mut line = String::with_capacity(record.len() + 2);
        if !ends_with_newline(&mut file).map_err(|e| TransferError::io(&self.path, e))? {
            log::warn!(
                "Log {} ends with a partial record, starting a new line",
                self.path.display()
            );
            line.push('\n');
        }
        line.push_str(record);
        line.push('\n');

        file.write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
            .map_err(|e| TransferError::io(&self.path, e))
    }

    /// All records in file order, or `None` if the log does not exist
    ///
    /// Invalid UTF-8 is replaced rather than rejected so a damaged line
    /// cannot hide the rest of the history.
    pub fn lines(&self) -> TransferResult<Option<Vec<String>>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TransferError::io(&self.path, e)),
        };

        Ok(Some(
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect(),
        ))
    }

    /// Scans newest-first and returns the first record `parse` accepts
    ///
    /// Lines `parse` rejects are skipped. Returns `None` if the log does not
    /// exist or no line is accepted.
    pub fn most_recent<T, F>(&self, parse: F) -> TransferResult<Option<T>>
    where
        F: Fn(&str) -> Option<T>,
    {
        let Some(lines) = self.lines()? else {
            return Ok(None);
        };

        Ok(lines.iter().rev().find_map(|line| parse(line)))
    }
}

/// True for an empty file or one whose last byte is a newline
fn ends_with_newline(file: &mut fs::File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
