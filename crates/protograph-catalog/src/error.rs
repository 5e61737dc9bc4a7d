//! Error types for catalog operations.

use std::io;
use thiserror::Error;

/// The error type for catalog operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Catalog document failed validation.
    #[error("Invalid catalog document: {0}")]
    Validation(String),

    /// An artifact or dependency URN is malformed.
    #[error(transparent)]
    Urn(#[from] protograph::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A specialized Result type for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;
