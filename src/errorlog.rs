//! Append-only CSV error log (`errorlog.csv`): one row per skipped file, row or entry.

use crate::error::Result;
use chrono::Local;
use log::error;
use std::fs;
use std::path::{Path, PathBuf};

const HEADER: [&str; 3] = ["Timestamp", "Entry", "Error Message"];

#[derive(Clone, Debug)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ErrorLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row; writes the header first if the file is new or empty.
    pub fn append(&self, context: &str, message: &str) -> Result<()> {
        let f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let empty = f.metadata()?.len() == 0;
        let mut w = csv::Writer::from_writer(f);
        if empty {
            w.write_record(HEADER)?;
        }
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        w.write_record([stamp.as_str(), context, message])?;
        w.flush()?;
        Ok(())
    }

    /// Like [`append`](Self::append) but never fails; sink errors go to the console log.
    pub fn record(&self, context: &str, message: &str) {
        if let Err(e) = self.append(context, message) {
            error!("could not write {}: {} (entry: {}; message: {})", self.path.display(), e, context, message);
        }
    }
}
