//! Isopod image access
//!
//! This crate opens a read-only ISO 9660 disc image, materializes its
//! directory tree once, and streams file content out of it on demand.
//!
//! # Features
//!
//! - One-time directory enumeration at open, lock-free lookups afterwards
//! - Case-sensitive path resolution with empty segments ignored
//! - Chunked content streams with an independent read handle per stream
//! - Pluggable [`FileTree`] trait with an in-memory implementation for tests
//!
//! # Example
//!
//! ```
//! use isopod_image::{FileTree, MemoryImage};
//!
//! let mut image = MemoryImage::new();
//! image.add_file("/boot/vmlinuz", "kernel bits");
//!
//! let node = image.root().resolve("/boot/vmlinuz").unwrap();
//! assert_eq!(node.size(), Some(11));
//! ```

pub mod error;
pub mod iso;
pub mod memory;
pub mod tree;

pub use error::*;
pub use iso::*;
pub use memory::*;
pub use tree::*;
