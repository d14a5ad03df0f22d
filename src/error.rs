//! Error types for tsfill.
//!
//! Setup failures (config, mappings, missing input files, actuator start) end the run.
//! Everything else is reported per file or per record and the loop moves on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad settings override (flag or environment variable)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Mapping document unreadable or inconsistent
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Duration string is not `H:MM:SS`
    #[error("Invalid duration format '{0}'")]
    Format(String),

    /// Delimited text could not be parsed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook could not be opened or has no sheet
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// A UI-driving operation failed
    #[error("Actuator error: {0}")]
    Actuator(String),

    #[error("no input files matching 'All Activities YYYY-MM-DD.csv|.xlsx' in {0}")]
    NoInputFiles(String),
}

impl From<calamine::Error> for Error {
    fn from(e: calamine::Error) -> Self {
        Error::Spreadsheet(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Mapping(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
