//! Error types for the analysis pipeline.

use thiserror::Error;

/// All errors produced by pipeline operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// File extension is not `.csv`, `.xlsx`, or `.xls`.
    #[error("unsupported file format: '{extension}'")]
    UnsupportedFormat { extension: String },
    /// Structural parse failure in a delimited file.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    /// Spreadsheet could not be opened or read.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
    /// Column length does not match the table's row count.
    #[error("expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Too few rows for the requested computation.
    #[error("need at least {min_required} rows, got {actual}")]
    InsufficientData { min_required: usize, actual: usize },
    /// A parameter is outside its valid range.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },
    /// I/O failure while reading input or writing an artifact.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
