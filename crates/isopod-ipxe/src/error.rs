//! Error types for iPXE script generation

use thiserror::Error;

/// Error type for iPXE operations
#[derive(Debug, Error)]
pub enum IpxeError {
    /// Initrd argument with an empty image path
    #[error("invalid initrd spec: {0:?} (expected PATH or PATH,LABEL)")]
    InvalidInitrdSpec(String),
}

/// Result type for iPXE operations
pub type Result<T> = std::result::Result<T, IpxeError>;
