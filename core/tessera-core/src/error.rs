//! Error types for the Tessera table engine.
//!
//! All public APIs return `TesseraResult<T>` — no panics in library code.

use std::fmt;
use thiserror::Error;

/// Which input of a binary verb an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinSide::Left => write!(f, "left"),
            JoinSide::Right => write!(f, "right"),
        }
    }
}

/// Unified error type for all Tessera operations.
#[derive(Debug, Error)]
pub enum TesseraError {
    /// Lookup of a column name that the store does not have
    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    /// A column (or mask) does not match the table's row count
    #[error("length mismatch for '{column}': expected {expected} rows, got {actual}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Join key absent on one side
    #[error("join key '{column}' not found on {side} table")]
    JoinKeyNotFound { side: JoinSide, column: String },

    /// Asof join key is not numeric, integer or timestamp-like
    #[error("asof key '{column}' is not orderable (type {data_type})")]
    UnorderableKey { column: String, data_type: String },

    /// Cross join would exceed its `max_rows` guard
    #[error("cross join would produce {rows} rows, exceeding the limit of {max_rows}")]
    RowCountGuardExceeded { rows: u128, max_rows: usize },

    /// Physical row index outside the store
    #[error("row index {index} out of range for length {length}")]
    RowOutOfRange { index: usize, length: usize },

    /// Output would contain the same column name twice
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    /// Type mismatch between expected and actual values
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Row literal is missing a field seen in other rows
    #[error("row {row} is missing field '{column}'")]
    RaggedRow { row: usize, column: String },

    /// Invalid arguments
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Join backend failure
    #[error("join backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },

    /// Configuration error (file or environment)
    #[error("config error: {0}")]
    Config(String),

    /// Apache Arrow error (kernel or RecordBatch operations)
    #[error("arrow error: {source}")]
    Arrow {
        #[from]
        source: arrow::error::ArrowError,
    },

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for all Tessera operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        TesseraError::Serialization(err.to_string())
    }
}
