//! Error types for structural analysis failures.
//!
//! Per-row and per-group problems (missing values, failed fits) are carried as
//! values; only failures that make the whole input unusable end up here.

use thiserror::Error;

/// Errors that abort an analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Input table has no data rows
    #[error("input contains no trials")]
    EmptyInput,

    /// A required column could not be found under any accepted name
    #[error("missing required column: {0}")]
    MissingColumn(String),

    /// A cell could not be parsed
    #[error("row {row}: invalid value {value:?} in column {column}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    /// Model tag not present in the registry
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// Sigmoid family name not recognized
    #[error("unknown sigmoid family: {0}")]
    UnknownSigmoid(String),

    /// Invalid or inconsistent configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
