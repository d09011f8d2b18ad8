//! Error types for sitemapgen.
//!
//! Library crates use [`SitemapError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all sitemapgen operations.
#[derive(Debug, thiserror::Error)]
pub enum SitemapError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Route tree could not be walked at all (missing root, not a directory).
    #[error("discovery error: {message}")]
    Discovery { message: String },

    /// A sitemap document could not be serialized.
    #[error("serialization error in partition {partition}: {message}")]
    Serialization { partition: String, message: String },

    /// Some partitions were rendered, others were omitted.
    #[error("partial result: {} partition(s) failed: {}", failed.len(), failed.join(", "))]
    PartialResult { failed: Vec<String> },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid URL, schedule, caps, ...).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SitemapError>;

impl SitemapError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a discovery error from any displayable message.
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery {
            message: msg.into(),
        }
    }

    /// Create a serialization error for a named partition.
    pub fn serialization(partition: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            partition: partition.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
