//! Error taxonomy for the analyzer.
//!
//! Every variant is fatal for the run: the orchestrator stops at the first
//! error, terminates the progress reporter and hands the error to `main`.

use std::path::PathBuf;
use thiserror::Error;

use crate::stats::StatsError;

/// Result type used throughout the analyzer
pub type Result<T> = std::result::Result<T, AnalyzerError>;

/// Errors that abort an analysis run.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// A batch-mode file name does not carry the `count_maker_date_title` fields.
    #[error("cannot decompose '{name}': {reason}")]
    Decomposition { name: String, reason: String },

    /// The input could not be read as an image.
    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A channel yielded no samples.
    #[error("{channel} channel: {source}")]
    Stats {
        channel: &'static str,
        #[source]
        source: StatsError,
    },

    /// Reading or writing a file failed.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tabular stream rejected a row.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The record stream could not serialize a record.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A histogram or channel image could not be encoded.
    #[error("failed to render {}: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A figure font file could not be read or parsed.
    #[error("cannot load font {}: {reason}", path.display())]
    Font { path: PathBuf, reason: String },

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AnalyzerError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalyzerError::Io {
            path: path.into(),
            source,
        }
    }
}
