//! Error types for weft-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the weft-core library
///
/// Only conditions that cross a component boundary live here. Malformed
/// lines, missing sidecars and unlinked spawn items are normal results and
/// never surface as errors.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error (missing or unreadable log file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File watch registration or delivery failure
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Parse error for a log that cannot be interpreted at all
    #[error("parse error in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Session log not found
    #[error("session not found: {0}")]
    SessionNotFound(String),
}

/// Result type alias for weft-core
pub type Result<T> = std::result::Result<T, Error>;
