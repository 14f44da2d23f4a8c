//! In-memory file tree for tests and examples
//!
//! Serves the same [`FileTree`] contract as a real disc image without any
//! backing file, so handler and resolver behavior can be exercised with
//! hand-built trees.

use crate::error::{ImageError, Result};
use crate::tree::{join_path, ContentStream, FileTree, Node, CONTENT_CHUNK_SIZE};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// A [`FileTree`] built entirely in memory.
pub struct MemoryImage {
    root: Node,
    contents: HashMap<String, Bytes>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self {
            root: Node::dir("", "/", Vec::new()),
            contents: HashMap::new(),
        }
    }

    /// Adds a file at `path`, creating intermediate directories as needed.
    /// An existing entry with the same name is replaced.
    pub fn add_file(&mut self, path: &str, content: impl Into<Bytes>) {
        let content = content.into();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((&file_name, dir_segments)) = segments.split_last() else {
            return;
        };

        let mut dir_path = String::from("/");
        let mut children = self.root.children_mut();
        for segment in dir_segments {
            let child_path = join_path(&dir_path, segment);
            children = dir_children(children, segment, &child_path);
            dir_path = child_path;
        }

        let file_path = join_path(&dir_path, file_name);
        children.retain(|c| c.name() != file_name);
        children.push(Node::file(file_name, file_path.clone(), content.len() as u64));
        self.contents.insert(file_path, content);
    }

    /// Adds a directory at `path`, creating intermediate directories as
    /// needed. Adding an existing directory is a no-op.
    pub fn add_dir(&mut self, path: &str) {
        let mut dir_path = String::from("/");
        let mut children = self.root.children_mut();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let child_path = join_path(&dir_path, segment);
            children = dir_children(children, segment, &child_path);
            dir_path = child_path;
        }
    }
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds or creates the directory child `name` under `children` and returns
/// its own child list. A file occupying the name is replaced.
fn dir_children<'a>(children: &'a mut Vec<Node>, name: &str, path: &str) -> &'a mut Vec<Node> {
    children.retain(|c| c.name() != name || c.is_dir());
    let idx = match children.iter().position(|c| c.name() == name) {
        Some(idx) => idx,
        None => {
            children.push(Node::dir(name, path, Vec::new()));
            children.len() - 1
        }
    };
    children[idx].children_mut()
}

#[async_trait]
impl FileTree for MemoryImage {
    fn root(&self) -> &Node {
        &self.root
    }

    async fn content(&self, path: &str) -> Result<ContentStream> {
        let node = self
            .root
            .resolve(path)
            .ok_or_else(|| ImageError::NotFound(path.to_string()))?;
        if node.is_dir() {
            return Err(ImageError::NotAFile(path.to_string()));
        }
        let mut rest = self.contents.get(node.path()).cloned().unwrap_or_default();

        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            while !rest.is_empty() {
                let take = rest.len().min(CONTENT_CHUNK_SIZE);
                let chunk = rest.split_to(take);
                if tx.send(Ok(chunk)).await.is_err() {
                    break;
                }
            }
        });
        Ok(ReceiverStream::new(rx))
    }
}
