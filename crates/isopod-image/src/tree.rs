//! Materialized directory tree and the file tree access trait
//!
//! The tree is built once when the image is opened and never mutated while
//! the server runs, so request handlers may share it freely without locks.
//! File content is deliberately not part of the tree: it is streamed on
//! demand through [`FileTree::content`], and every call gets its own read
//! cursor so concurrent transfers cannot disturb each other.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio_stream::wrappers::ReceiverStream;

/// Chunk size for content streams
pub(crate) const CONTENT_CHUNK_SIZE: usize = 64 * 1024;

/// Stream of file content chunks, produced by [`FileTree::content`]
pub type ContentStream = ReceiverStream<std::io::Result<Bytes>>;

/// A single entry in the materialized tree
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) kind: NodeKind,
}

/// What a [`Node`] is: a directory with ordered children, or a regular file
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Directory with children in enumeration order
    Directory { children: Vec<Node> },
    /// Regular file
    File { size: u64 },
}

impl Node {
    pub(crate) fn dir(name: impl Into<String>, path: impl Into<String>, children: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::Directory { children },
        }
    }

    pub(crate) fn file(name: impl Into<String>, path: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: NodeKind::File { size },
        }
    }

    /// Entry name (empty for the root)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical absolute path of this entry within the image (`/` for the
    /// root, no duplicate or trailing slashes otherwise)
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// File size in bytes; `None` for directories
    pub fn size(&self) -> Option<u64> {
        match self.kind {
            NodeKind::Directory { .. } => None,
            NodeKind::File { size } => Some(size),
        }
    }

    /// Children in enumeration order; `None` for files
    pub fn children(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    /// Looks up a direct child by exact, case-sensitive name. Files have no
    /// children, so any lookup on a file fails.
    pub fn child(&self, name: &str) -> Option<&Node> {
        match &self.kind {
            NodeKind::Directory { children } => children.iter().find(|c| c.name == name),
            NodeKind::File { .. } => None,
        }
    }

    /// Resolves a slash-delimited request path against this node.
    ///
    /// Empty segments are discarded, so `//a//b/` and `/a/b` resolve to the
    /// same entry and `""`, `"/"` and `"//"` all resolve to the node itself.
    /// Each remaining segment must match a child by exact name; the first
    /// mismatch aborts the walk with `None`.
    pub fn resolve(&self, request_path: &str) -> Option<&Node> {
        let mut node = self;
        for segment in request_path.split('/').filter(|s| !s.is_empty()) {
            node = node.child(segment)?;
        }
        Some(node)
    }

    /// Children of a directory node. All callers hold directory nodes by
    /// construction.
    pub(crate) fn children_mut(&mut self) -> &mut Vec<Node> {
        match &mut self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => unreachable!("children_mut called on a file node"),
        }
    }
}

/// Joins a canonical parent path with a child name, keeping the result
/// canonical (single slashes, no trailing slash).
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Read access to an image: the materialized tree plus on-demand content
/// streams.
///
/// Implementations must hand out an independent read cursor per
/// [`content`](FileTree::content) call; concurrent streams over the same or
/// different files must never share a seek position.
#[async_trait]
pub trait FileTree: Send + Sync {
    /// Root directory of the tree. Always a directory.
    fn root(&self) -> &Node;

    /// Opens a content stream for the regular file at `path`. The path is
    /// resolved with the same rules as [`Node::resolve`].
    async fn content(&self, path: &str) -> Result<ContentStream>;
}
