use std::path::PathBuf;

use thiserror::Error;

/// Infrastructure error for rowcheck operations.
///
/// This type covers the harness's own plumbing: schema construction,
/// configuration, and the replay log. Misbehavior of the container under
/// test is never reported through it; that travels as a harness failure
/// value so one bad call can't abort a run.
#[derive(Error, Debug)]
pub enum RowcheckError {
    // === Schema Errors ===
    /// Column names and column types have different lengths.
    #[error("schema arity mismatch: {names} column names but {types} column types")]
    SchemaArity { names: usize, types: usize },

    /// The primary index does not address a column.
    #[error("primary index {index} out of range for {arity} columns")]
    PrimaryIndexOutOfRange { index: usize, arity: usize },

    /// Any other structural problem with a schema.
    #[error("invalid schema: {detail}")]
    InvalidSchema { detail: String },

    // === Configuration Errors ===
    /// A configuration value could not be parsed or is out of range.
    #[error("invalid configuration for {key}: {detail}")]
    Config { key: String, detail: String },

    // === I/O Errors ===
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not create a log file.
    #[error("unable to open log file: '{path}'")]
    CannotOpenLog { path: PathBuf },

    // === Replay Log Errors ===
    /// JSON (de)serialization failed.
    #[error("serialization error: {detail}")]
    Serialization { detail: String },

    /// A replay log line could not be interpreted.
    #[error("malformed replay log at line {line}: {detail}")]
    ReplayFormat { line: usize, detail: String },

    // === Internal Errors ===
    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl RowcheckError {
    /// Whether the user can likely fix this without code changes.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SchemaArity { .. }
                | Self::PrimaryIndexOutOfRange { .. }
                | Self::InvalidSchema { .. }
                | Self::Config { .. }
                | Self::CannotOpenLog { .. }
        )
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::SchemaArity { .. } => Some("Give every column exactly one type"),
            Self::PrimaryIndexOutOfRange { .. } => {
                Some("Pick a primary index between 0 and the column count minus one")
            }
            Self::Config { .. } => Some("Check the ROWCHECK_* environment variables"),
            Self::CannotOpenLog { .. } => Some("Check that the log directory exists and is writable"),
            Self::ReplayFormat { .. } => Some("Regenerate the replay log with the same harness version"),
            _ => None,
        }
    }

    /// Create a configuration error.
    pub fn config(key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Config {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// Create a serialization error from any displayable cause.
    pub fn serialization(detail: impl std::fmt::Display) -> Self {
        Self::Serialization {
            detail: detail.to_string(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `RowcheckError`.
pub type Result<T, E = RowcheckError> = std::result::Result<T, E>;
