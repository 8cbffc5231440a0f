use crate::hash::Hash;
use serde::{Deserialize, Serialize};

/// A versioned path node. Paths are absolute, forward-slash separated,
/// and normalized: no `.`, `..`, or trailing slash except root `/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub hash: Hash,
    pub size: u64,
    pub mtime: i64,
    pub mode: u32,
    pub is_dir: bool,
    pub ignored: bool,
}

impl Entry {
    /// Bytes fed into the Merkle `root_hash` computation for a tree:
    /// path, hash, size and mode, but not `mtime` (mtime is metadata
    /// about the entry, not its content) or `ignored` (a view concern,
    /// not content).
    pub(crate) fn content_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.path.len() + 32 + 8 + 4 + 1);
        buf.extend_from_slice(self.path.as_bytes());
        buf.extend_from_slice(self.hash.as_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(&self.mode.to_le_bytes());
        buf.push(self.is_dir as u8);
        buf
    }
}

/// Merkle hash of a sorted entry tree: `blake3` over the
/// concatenation of each entry's content bytes, in path order.
pub fn root_hash<'a>(entries: impl Iterator<Item = &'a Entry>) -> Hash {
    let mut sorted: Vec<&Entry> = entries.collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut hasher = blake3::Hasher::new();
    for entry in sorted {
        hasher.update(&entry.content_bytes());
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(hasher.finalize().as_bytes());
    Hash(out)
}

/// Normalizes a path per the data model: absolute, `/`-separated, no
/// `.`/`..` segments, no trailing slash except root.
pub fn normalize_path(path: &str) -> String {
    let mut segments = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalizes_dot_segments() {
        assert_eq!(normalize_path("/a/./b/../c/"), "/a/c");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn root_hash_is_order_independent() {
        let a = Entry {
            path: "/a".into(),
            hash: Hash::from_bytes(b"a"),
            size: 1,
            mtime: 0,
            mode: 0o644,
            is_dir: false,
            ignored: false,
        };
        let b = Entry {
            path: "/b".into(),
            hash: Hash::from_bytes(b"b"),
            size: 1,
            mtime: 0,
            mode: 0o644,
            is_dir: false,
            ignored: false,
        };

        let h1 = root_hash(vec![&a, &b].into_iter());
        let h2 = root_hash(vec![&b, &a].into_iter());
        assert_eq!(h1, h2);
    }
}
