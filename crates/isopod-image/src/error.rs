//! Error types for image access
//!
//! This module provides error types for opening a disc image, materializing
//! its directory tree, and reading file content out of it.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for image operations
#[derive(Debug, Error)]
pub enum ImageError {
    /// Failed to open the image file itself
    #[error("failed to open image {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image could not be parsed as a filesystem
    #[error("failed to parse image {}: {detail}", path.display())]
    Parse { path: PathBuf, detail: String },

    /// No entry exists at the given path inside the image
    #[error("no such path in image: {0}")]
    NotFound(String),

    /// The entry exists but is a directory, not a regular file
    #[error("not a file: {0}")]
    NotAFile(String),
}

/// Result type for image operations
pub type Result<T> = std::result::Result<T, ImageError>;
