use std::collections::BTreeMap;

use crate::tree::{base_name, parent_path, HashTree, Node};

/// Compose an ordered sequence of trees into one.
///
/// Later trees override earlier ones at leaf granularity; directories are
/// unioned. A later file landing on a path an earlier directory occupies
/// evicts that directory's whole subtree (the parent-is-a-directory
/// invariant must survive the merge), and a later directory evicts an
/// earlier file at its path. Composing nothing yields the empty tree.
pub fn merge(trees: impl IntoIterator<Item = HashTree>) -> HashTree {
    let mut out: BTreeMap<String, Node> = BTreeMap::new();
    out.insert(String::new(), Node::empty_dir());

    for tree in trees {
        // Full-path order guarantees parents are handled before children,
        // so by the time a node lands its parent is a directory in `out`.
        for (path, node) in tree.iter() {
            match node {
                Node::Directory { .. } => merge_dir(&mut out, path),
                Node::File { size, blocks } => merge_file(
                    &mut out,
                    path,
                    Node::File {
                        size: *size,
                        blocks: blocks.clone(),
                    },
                ),
            }
        }
    }

    HashTree::from_nodes(out)
}

fn merge_dir(out: &mut BTreeMap<String, Node>, path: &str) {
    match out.get(path) {
        Some(Node::Directory { .. }) => {}
        Some(Node::File { .. }) => {
            out.insert(path.to_string(), Node::empty_dir());
            link(out, path);
        }
        None => {
            out.insert(path.to_string(), Node::empty_dir());
            link(out, path);
        }
    }
}

fn merge_file(out: &mut BTreeMap<String, Node>, path: &str, node: Node) {
    if matches!(out.get(path), Some(Node::Directory { .. })) {
        evict_subtree(out, path);
    }
    out.insert(path.to_string(), node);
    link(out, path);
}

/// Remove a directory node and everything beneath it.
///
/// Names like `d!` sort between `d` and `d/`, so the descendant scan must
/// start at the child prefix rather than at the directory itself.
fn evict_subtree(out: &mut BTreeMap<String, Node>, path: &str) {
    out.remove(path);
    let child_prefix = format!("{path}/");
    let doomed: Vec<String> = out
        .range(child_prefix.clone()..)
        .map(|(k, _)| k.clone())
        .take_while(|k| k.starts_with(&child_prefix))
        .collect();
    for key in doomed {
        out.remove(&key);
    }
}

fn link(out: &mut BTreeMap<String, Node>, path: &str) {
    if let Some(Node::Directory { children }) = out.get_mut(parent_path(path)) {
        children.insert(base_name(path).to_string());
    }
}
