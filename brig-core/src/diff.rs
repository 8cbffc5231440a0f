//! Structural diff between two resolved entry sets.
//!
//! Pure over two already-resolved trees; revision resolution and the
//! optional remote fetch are the caller's job ([`crate::sync`] and
//! [`crate::catalog::CatalogStore::status`]). Grounded on
//! `original_source/cmd/vcs_handlers.go`'s diff/status handlers, with
//! the `(local, remote)` argument order fixed per the Open Question.

use crate::catalog::Entry;
use std::collections::{BTreeMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pair {
    pub src: Entry,
    pub dst: Entry,
}

#[derive(Clone, Debug, Default)]
pub struct Diff {
    pub added: Vec<Entry>,
    pub removed: Vec<Entry>,
    pub missing: Vec<Entry>,
    pub ignored: Vec<Entry>,
    pub moved: Vec<Pair>,
    pub merged: Vec<Pair>,
    pub conflict: Vec<Pair>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.missing.is_empty()
            && self.ignored.is_empty()
            && self.moved.is_empty()
            && self.merged.is_empty()
            && self.conflict.is_empty()
    }
}

fn in_scope(path: &str, folders: &[String]) -> bool {
    folders.is_empty() || folders.iter().any(|f| path == f || path.starts_with(&format!("{f}/")))
}

/// Computes the classified diff between `local` and `remote` entry
/// sets. `local_folders` scopes which of the remote's novel paths are
/// eligible to land as `added` rather than `missing` (an empty slice
/// means "everything is in scope", matching a repository with no
/// folder restriction). `ancestor`, when available, is the nearest
/// common ancestor tree; it's what lets a same-path divergence be
/// classified `merged` (both sides moved independently away from a
/// known-identical ancestor) rather than `conflict` (no such proof
/// exists).
///
/// `ancestor` also gates `removed`: a local-only entry is only a
/// genuine removal candidate if the ancestor already had it (meaning
/// `remote` once agreed and has since dropped it). A local-only entry
/// absent from the ancestor is a not-yet-synced local addition, not a
/// deletion candidate. Callers with no three-way context (self-diffs
/// against `None`) keep the plain two-way reading: every local-only
/// entry is `removed`.
pub fn make_diff(
    local: &BTreeMap<String, Entry>,
    remote: &BTreeMap<String, Entry>,
    local_folders: &[String],
    ancestor: Option<&BTreeMap<String, Entry>>,
) -> Diff {
    let local_only: Vec<&Entry> = local
        .values()
        .filter(|e| !remote.contains_key(&e.path))
        .collect();
    let remote_only: Vec<&Entry> = remote
        .values()
        .filter(|e| !local.contains_key(&e.path))
        .collect();

    // Rename pre-pass: strict hash equality only, no similarity heuristic.
    let mut moved = Vec::new();
    let mut moved_local: HashSet<&str> = HashSet::new();
    let mut moved_remote: HashSet<&str> = HashSet::new();
    for r in &remote_only {
        if moved_remote.contains(r.path.as_str()) {
            continue;
        }
        if let Some(l) = local_only
            .iter()
            .find(|l| l.hash == r.hash && !moved_local.contains(l.path.as_str()))
        {
            moved.push(Pair {
                src: (*l).clone(),
                dst: (*r).clone(),
            });
            moved_local.insert(l.path.as_str());
            moved_remote.insert(r.path.as_str());
        }
    }

    let mut added = Vec::new();
    let mut missing = Vec::new();
    for r in &remote_only {
        if moved_remote.contains(r.path.as_str()) || r.ignored {
            continue;
        }
        if in_scope(&r.path, local_folders) {
            added.push((*r).clone());
        } else {
            missing.push((*r).clone());
        }
    }

    let mut removed = Vec::new();
    for l in &local_only {
        if moved_local.contains(l.path.as_str()) || l.ignored {
            continue;
        }
        let known_to_ancestor = ancestor.map(|a| a.contains_key(&l.path)).unwrap_or(true);
        if known_to_ancestor {
            removed.push((*l).clone());
        }
    }

    let mut ignored_paths = HashSet::new();
    let mut ignored = Vec::new();
    for e in local.values().chain(remote.values()) {
        if e.ignored && ignored_paths.insert(e.path.clone()) {
            ignored.push(e.clone());
        }
    }

    let mut merged = Vec::new();
    let mut conflict = Vec::new();
    for (path, l) in local.iter() {
        let Some(r) = remote.get(path) else { continue };
        if l.hash == r.hash || l.ignored || r.ignored {
            continue;
        }

        let diverged_from_common_ancestor = ancestor
            .and_then(|a| a.get(path))
            .map(|a| a.hash != l.hash && a.hash != r.hash)
            .unwrap_or(false);

        let pair = Pair {
            src: l.clone(),
            dst: r.clone(),
        };
        if diverged_from_common_ancestor {
            merged.push(pair);
        } else {
            conflict.push(pair);
        }
    }

    added.sort_by(|a, b| a.path.cmp(&b.path));
    removed.sort_by(|a, b| a.path.cmp(&b.path));
    missing.sort_by(|a, b| a.path.cmp(&b.path));
    ignored.sort_by(|a, b| a.path.cmp(&b.path));
    moved.sort_by(|a, b| a.dst.path.cmp(&b.dst.path));
    merged.sort_by(|a, b| a.dst.path.cmp(&b.dst.path));
    conflict.sort_by(|a, b| a.dst.path.cmp(&b.dst.path));

    Diff {
        added,
        removed,
        missing,
        ignored,
        moved,
        merged,
        conflict,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hash::Hash;

    fn entry(path: &str, data: &[u8]) -> Entry {
        Entry {
            path: path.to_string(),
            hash: Hash::from_bytes(data),
            size: data.len() as u64,
            mtime: 0,
            mode: 0o644,
            is_dir: false,
            ignored: false,
        }
    }

    fn tree(entries: &[Entry]) -> BTreeMap<String, Entry> {
        entries.iter().cloned().map(|e| (e.path.clone(), e)).collect()
    }

    #[test]
    fn identical_trees_diff_empty() {
        let t = tree(&[entry("/a", b"hello")]);
        let d = make_diff(&t, &t, &[], None);
        assert!(d.is_empty());
    }

    #[test]
    fn scenario_5_independent_additions() {
        let base = tree(&[]);
        let a_added = tree(&[entry("/x", b"x")]);
        let d = make_diff(&base, &a_added, &[], None);
        assert_eq!(d.added.len(), 1);
        assert_eq!(d.added[0].path, "/x");
    }

    #[test]
    fn scenario_6_same_path_different_contents_is_conflict() {
        let local = tree(&[entry("/x", b"local bytes")]);
        let remote = tree(&[entry("/x", b"remote bytes")]);
        let d = make_diff(&local, &remote, &[], None);
        assert_eq!(d.conflict.len(), 1);
        assert!(d.merged.is_empty());
    }

    #[test]
    fn rename_detected_via_hash_match() {
        let local = tree(&[entry("/a", b"hello"), entry("/b", b"world")]);
        let remote = tree(&[entry("/c", b"hello"), entry("/b", b"world")]);
        let d = make_diff(&local, &remote, &[], None);
        assert_eq!(d.moved.len(), 1);
        assert_eq!(d.moved[0].src.path, "/a");
        assert_eq!(d.moved[0].dst.path, "/c");
        assert!(d.added.is_empty());
        assert!(d.removed.is_empty());
    }

    #[test]
    fn out_of_scope_new_entries_are_missing_not_added() {
        let local = tree(&[]);
        let remote = tree(&[entry("/outside/x", b"x")]);
        let d = make_diff(&local, &remote, &["/inside".to_string()], None);
        assert_eq!(d.missing.len(), 1);
        assert!(d.added.is_empty());
    }

    #[test]
    fn divergence_from_common_ancestor_is_merged() {
        let ancestor = tree(&[entry("/x", b"base")]);
        let local = tree(&[entry("/x", b"local change")]);
        let remote = tree(&[entry("/x", b"remote change")]);
        let d = make_diff(&local, &remote, &[], Some(&ancestor));
        assert_eq!(d.merged.len(), 1);
        assert!(d.conflict.is_empty());
    }

    #[test]
    fn local_only_entry_absent_from_ancestor_is_not_removed() {
        let ancestor = tree(&[]);
        let local = tree(&[entry("/x", b"new local file")]);
        let remote = tree(&[]);
        let d = make_diff(&local, &remote, &[], Some(&ancestor));
        assert!(d.removed.is_empty());
    }

    #[test]
    fn local_only_entry_present_in_ancestor_is_removed() {
        let ancestor = tree(&[entry("/x", b"shared base")]);
        let local = tree(&[entry("/x", b"shared base")]);
        let remote = tree(&[]);
        let d = make_diff(&local, &remote, &[], Some(&ancestor));
        assert_eq!(d.removed.len(), 1);
        assert_eq!(d.removed[0].path, "/x");
    }

    #[test]
    fn without_ancestor_local_only_falls_back_to_two_way_removed() {
        let local = tree(&[entry("/x", b"x")]);
        let remote = tree(&[]);
        let d = make_diff(&local, &remote, &[], None);
        assert_eq!(d.removed.len(), 1);
    }

    #[test]
    fn ignored_entries_are_excluded_from_added_and_removed() {
        let mut e = entry("/tmp/cache", b"junk");
        e.ignored = true;
        let local = tree(&[]);
        let remote = tree(&[e]);
        let d = make_diff(&local, &remote, &[], None);
        assert!(d.added.is_empty());
        assert_eq!(d.ignored.len(), 1);
    }
}
