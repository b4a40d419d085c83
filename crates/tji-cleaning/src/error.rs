//! Error types for cleaning operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CleaningError>;

#[derive(Error, Debug)]
pub enum CleaningError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Unrecognized gender: \"{0}\"")]
    UnrecognizedGender(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column already exists: {0}")]
    DuplicateColumn(String),

    #[error("Duplicate columns in {0}")]
    DuplicateColumns(&'static str),

    /// One message per column that is missing on either side
    #[error("{}", .0.join("\n"))]
    ColumnMismatch(Vec<String>),

    #[error("Row {row} has {found} cells, expected {expected}")]
    RowLength { row: usize, expected: usize, found: usize },
}
