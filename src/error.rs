//! Error types for the class reminder bot.

use std::path::PathBuf;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A data file row could not be understood.
    #[error("{}:{line}: {reason}", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// Notification sink rejected or failed to deliver a message.
    #[error("notify error: {0}")]
    Notify(String),

    /// Submission source failed to list or fetch submissions.
    #[error("submission source error: {0}")]
    Source(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid pattern.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;
