use std::collections::BTreeMap;

use silt_types::BlockRef;

use crate::error::{TreeError, TreeResult};
use crate::tree::{base_name, clean_path, parent_path, HashTree, Node};

/// Single-writer accumulator for a hash-tree.
///
/// `put_dir` and `put_file` are the only mutations. The builder is not
/// safe for concurrent use; callers serialize access (the upload path
/// guards one builder with a mutex). `finish` yields the immutable tree,
/// canonical by construction.
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: BTreeMap<String, Node>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(String::new(), Node::empty_dir());
        Self { nodes }
    }

    /// Record a directory, creating missing parents. Recording an existing
    /// directory again is a no-op; a file in the way is an error.
    pub fn put_dir(&mut self, path: &str) -> TreeResult<()> {
        let path = clean_path(path)?;
        if path.is_empty() {
            return Ok(());
        }
        self.ensure_dir(&path)
    }

    /// Record a file with its ordered block references. The parent chain
    /// is auto-created; inserting any path twice is an error (files are
    /// unique leaves).
    pub fn put_file(&mut self, path: &str, size: u64, blocks: Vec<BlockRef>) -> TreeResult<()> {
        let path = clean_path(path)?;
        if path.is_empty() {
            return Err(TreeError::InvalidPath {
                path: path.clone(),
                reason: "a file needs a non-root path".into(),
            });
        }
        if self.nodes.contains_key(&path) {
            return Err(TreeError::DuplicatePath(path));
        }
        let parent = parent_path(&path).to_string();
        if !parent.is_empty() {
            self.ensure_dir(&parent)?;
        }
        self.link_child(&parent, base_name(&path));
        self.nodes.insert(path, Node::File { size, blocks });
        Ok(())
    }

    /// Finalize into an immutable tree.
    pub fn finish(self) -> HashTree {
        HashTree::from_nodes(self.nodes)
    }

    fn ensure_dir(&mut self, path: &str) -> TreeResult<()> {
        let mut so_far = String::new();
        for component in path.split('/') {
            if !so_far.is_empty() {
                so_far.push('/');
            }
            so_far.push_str(component);
            match self.nodes.get(&so_far) {
                Some(Node::Directory { .. }) => {}
                Some(Node::File { .. }) => {
                    return Err(TreeError::NotADirectory(so_far));
                }
                None => {
                    self.link_child(parent_path(&so_far).to_string().as_str(), component);
                    self.nodes.insert(so_far.clone(), Node::empty_dir());
                }
            }
        }
        Ok(())
    }

    fn link_child(&mut self, parent: &str, name: &str) {
        if let Some(Node::Directory { children }) = self.nodes.get_mut(parent) {
            children.insert(name.to_string());
        }
    }
}
