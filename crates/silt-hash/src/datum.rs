use silt_types::{FileInfo, PipelineInfo, Tag};

use crate::encoding::{put_str, put_uvarint};
use crate::hasher::ContentHasher;

/// Compute the deterministic fingerprint of `(datum, transform)`.
///
/// The fingerprint is the tag under which the datum's output tree is
/// recorded: equal inputs and transform always produce equal tags, so a
/// second worker seeing the same datum finds the first worker's output.
///
/// File infos are stable-sorted by input name before encoding, making the
/// tag invariant under pipeline-author reordering of the input list. The
/// transform's environment is encoded in `BTreeMap` order and the accepted
/// return codes sorted ascending, so no map or author ordering leaks into
/// the digest. The encoding version is pinned by the hasher's domain tag.
pub fn hash_datum(data: &[FileInfo], pipeline: &PipelineInfo) -> Tag {
    let mut infos: Vec<&FileInfo> = data.iter().collect();
    infos.sort_by(|a, b| a.name.cmp(&b.name));

    let mut buf = Vec::new();
    put_uvarint(&mut buf, infos.len() as u64);
    for info in infos {
        put_str(&mut buf, &info.name);
        put_str(&mut buf, &info.path);
        put_str(&mut buf, &info.hash);
    }

    let t = &pipeline.transform;
    put_uvarint(&mut buf, t.cmd.len() as u64);
    for arg in &t.cmd {
        put_str(&mut buf, arg);
    }
    put_uvarint(&mut buf, t.stdin.len() as u64);
    for line in &t.stdin {
        put_str(&mut buf, line);
    }
    put_uvarint(&mut buf, t.env.len() as u64);
    for (key, value) in &t.env {
        put_str(&mut buf, key);
        put_str(&mut buf, value);
    }
    let mut codes = t.accept_return_codes.clone();
    codes.sort_unstable();
    codes.dedup();
    put_uvarint(&mut buf, codes.len() as u64);
    for code in codes {
        put_uvarint(&mut buf, code as u32 as u64);
    }

    Tag::new(hex::encode(ContentHasher::DATUM.hash(&buf)))
}
