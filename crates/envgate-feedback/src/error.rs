// error.rs — Error types for the feedback journal.
//
// Journal failures are surfaced to the caller and never retried here.
// Losing a feedback record is not safety-critical, so callers usually log
// these and keep going.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing or reading the feedback journal.
#[derive(Debug, Error)]
pub enum FeedbackError {
    /// Failed to open (or create) a journal file.
    #[error("failed to open feedback journal at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A filesystem operation on the journal or its directory failed.
    #[error("feedback journal I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An outcome could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The agent or environment name cannot be used as a journal key.
    #[error("invalid {field} name '{value}' for a feedback journal")]
    InvalidKey { field: &'static str, value: String },

    /// The store was closed; no further appends are accepted.
    #[error("feedback journal at {path} is closed")]
    Closed { path: PathBuf },
}
