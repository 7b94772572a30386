//! The pinned v1 wire format for hash-trees.
//!
//! Layout, depth-first from the root, children in byte-wise lexicographic
//! order. Per node: varint-length-prefixed path, one tag byte; directories
//! carry a varint child count and the length-prefixed child names in
//! order; files carry `size: u64 BE`, a varint block count, and each
//! block reference as `(hash: 32B, offset: u64 BE, length: u64 BE)`.
//!
//! Decoding validates the canonical ordering, so any bytes that decode at
//! all re-serialize to the identical byte string. The tree hash (the
//! fileset id) is the domain-separated BLAKE3 of these bytes.

use std::collections::{BTreeMap, BTreeSet};

use silt_hash::encoding::{put_str, put_uvarint, read_str, read_uvarint};
use silt_hash::ContentHasher;
use silt_types::{BlockRef, FilesetId};

use crate::error::{TreeError, TreeResult};
use crate::tree::{HashTree, Node};

const TAG_DIR: u8 = 0;
const TAG_FILE: u8 = 1;

/// Serialize a tree into its canonical wire form.
pub fn serialize(tree: &HashTree) -> Vec<u8> {
    let mut buf = Vec::new();
    write_node(&mut buf, tree, "");
    buf
}

/// The content-addressed id of a serialized tree.
pub fn tree_id(bytes: &[u8]) -> FilesetId {
    FilesetId::from_hash(ContentHasher::TREE.hash(bytes))
}

/// Decode canonical wire bytes back into a tree.
///
/// Rejects anything non-canonical: out-of-order children, duplicate
/// names, misplaced nodes, or trailing bytes.
pub fn deserialize(data: &[u8]) -> TreeResult<HashTree> {
    let mut nodes = BTreeMap::new();
    let mut pos = 0;
    read_node(data, &mut pos, "", &mut nodes, true)?;
    if pos != data.len() {
        return Err(TreeError::Corrupt("trailing bytes after root".into()));
    }
    Ok(HashTree::from_nodes(nodes))
}

fn write_node(buf: &mut Vec<u8>, tree: &HashTree, path: &str) {
    put_str(buf, path);
    match tree.nodes().get(path).expect("tree invariant: node exists") {
        Node::Directory { children } => {
            buf.push(TAG_DIR);
            put_uvarint(buf, children.len() as u64);
            for name in children {
                put_str(buf, name);
            }
            for name in children {
                let child_path = join(path, name);
                write_node(buf, tree, &child_path);
            }
        }
        Node::File { size, blocks } => {
            buf.push(TAG_FILE);
            buf.extend_from_slice(&size.to_be_bytes());
            put_uvarint(buf, blocks.len() as u64);
            for block in blocks {
                buf.extend_from_slice(&block.hash);
                buf.extend_from_slice(&block.offset.to_be_bytes());
                buf.extend_from_slice(&block.length.to_be_bytes());
            }
        }
    }
}

fn read_node(
    data: &[u8],
    pos: &mut usize,
    expect_path: &str,
    nodes: &mut BTreeMap<String, Node>,
    is_root: bool,
) -> TreeResult<()> {
    let (path, n) = read_str(&data[*pos..])?;
    *pos += n;
    if path != expect_path {
        return Err(TreeError::Corrupt(format!(
            "node out of place: expected {expect_path:?}, found {path:?}"
        )));
    }
    let tag = *data.get(*pos).ok_or_else(|| {
        TreeError::Corrupt("truncated node tag".into())
    })?;
    *pos += 1;

    match tag {
        TAG_DIR => {
            let (count, n) = read_uvarint(&data[*pos..])?;
            *pos += n;
            let mut children = BTreeSet::new();
            let mut previous: Option<String> = None;
            for _ in 0..count {
                let (name, n) = read_str(&data[*pos..])?;
                *pos += n;
                if name.is_empty() {
                    return Err(TreeError::Corrupt("empty child name".into()));
                }
                if let Some(prev) = &previous {
                    if name <= prev.as_str() {
                        return Err(TreeError::Corrupt(
                            "children not in strictly ascending order".into(),
                        ));
                    }
                }
                previous = Some(name.to_string());
                children.insert(name.to_string());
            }
            let names: Vec<String> = children.iter().cloned().collect();
            nodes.insert(expect_path.to_string(), Node::Directory { children });
            for name in names {
                let child_path = join(expect_path, &name);
                read_node(data, pos, &child_path, nodes, false)?;
            }
            Ok(())
        }
        TAG_FILE => {
            if is_root {
                return Err(TreeError::Corrupt("root must be a directory".into()));
            }
            let size = read_u64(data, pos)?;
            let (count, n) = read_uvarint(&data[*pos..])?;
            *pos += n;
            let mut blocks = Vec::with_capacity(count.min(1024) as usize);
            for _ in 0..count {
                let hash = read_hash(data, pos)?;
                let offset = read_u64(data, pos)?;
                let length = read_u64(data, pos)?;
                blocks.push(BlockRef {
                    hash,
                    offset,
                    length,
                });
            }
            nodes.insert(expect_path.to_string(), Node::File { size, blocks });
            Ok(())
        }
        other => Err(TreeError::Corrupt(format!("unknown node tag {other}"))),
    }
}

fn read_u64(data: &[u8], pos: &mut usize) -> TreeResult<u64> {
    let end = *pos + 8;
    let bytes = data
        .get(*pos..end)
        .ok_or_else(|| TreeError::Corrupt("truncated u64".into()))?;
    *pos = end;
    Ok(u64::from_be_bytes(bytes.try_into().expect("8-byte slice")))
}

fn read_hash(data: &[u8], pos: &mut usize) -> TreeResult<[u8; 32]> {
    let end = *pos + 32;
    let bytes = data
        .get(*pos..end)
        .ok_or_else(|| TreeError::Corrupt("truncated block hash".into()))?;
    *pos = end;
    Ok(bytes.try_into().expect("32-byte slice"))
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}/{name}")
    }
}
