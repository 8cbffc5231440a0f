//! Versioned metadata catalog: commits, tags, history, reset, status.
//!
//! A local, crash-safe key-value database over an append-only log
//! plus a rebuildable in-memory index, grounded on the teacher's
//! transaction-log-replay design (`index.rs`) but specialized to a
//! Git-like commit DAG rather than infinitree's generic field/
//! collection machinery (judged unnecessary complexity for this
//! module's simpler shape).

mod commit;
mod entry;
mod ignore;
mod log;

pub use commit::{Commit, CommitId, PeerId};
pub use entry::{normalize_path, root_hash, Entry};
pub use ignore::Pattern;

use crate::hash::Hash;
use log::Record;
use std::{
    collections::{BTreeMap, HashMap},
    io::{self, Read, Seek, SeekFrom, Write},
};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("ambiguous reference {0:?} matches {1} commits")]
    AmbiguousRef(String, usize),
    #[error("CURR has local modifications at {0:?}; use force to overwrite")]
    DirtyCurr(String),
    #[error("nothing changed")]
    NothingChanged,
    #[error("read-only view while become()-ing another peer")]
    ReadOnlyView,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedRef {
    Curr,
    Commit(CommitId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HistoryMask {
    Added,
    Removed,
    Modified,
    Moved,
}

#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub head_commit: CommitId,
    pub next_commit: CommitId,
    pub mask: HistoryMask,
    pub moved_to: Option<String>,
    pub was_previously_at: Option<String>,
}

/// The versioned metadata catalog for one repository.
///
/// `S` is the append-only log sink (a file in production, an
/// in-memory cursor in tests). All mutation goes through
/// [`CatalogStore::persist`], which writes the record to `S` before
/// applying it in memory, giving the crash-consistency property:
/// replaying `S` from scratch always reproduces the current state.
pub struct CatalogStore<S> {
    sink: S,
    local_peer_id: PeerId,

    commits: HashMap<CommitId, Commit>,
    trees: HashMap<CommitId, BTreeMap<String, Entry>>,
    curr: BTreeMap<String, Entry>,
    head: Option<CommitId>,

    tags: HashMap<String, CommitId>,
    ignores: Vec<Pattern>,
    refs: HashMap<PeerId, CommitId>,
    keystore: Mutex<HashMap<Hash, [u8; 32]>>,

    become_peer: Option<PeerId>,
}

impl<S: Read + Write + Seek> CatalogStore<S> {
    /// Opens a catalog backed by `sink`, replaying any existing
    /// records to rebuild in-memory state.
    pub fn open(mut sink: S, local_peer_id: impl Into<String>) -> Result<Self> {
        sink.seek(SeekFrom::Start(0))?;
        let records = log::replay(&mut sink);
        sink.seek(SeekFrom::End(0))?;

        let mut store = CatalogStore {
            sink,
            local_peer_id: local_peer_id.into(),
            commits: HashMap::new(),
            trees: HashMap::new(),
            curr: BTreeMap::new(),
            head: None,
            tags: HashMap::new(),
            ignores: Vec::new(),
            refs: HashMap::new(),
            keystore: Mutex::new(HashMap::new()),
            become_peer: None,
        };

        for record in records {
            store.apply(record);
        }

        Ok(store)
    }

    fn apply(&mut self, record: Record) {
        match record {
            Record::Commit(commit) => {
                self.trees.insert(commit.id, self.curr.clone());
                self.head = Some(commit.id);
                self.commits.insert(commit.id, commit);
            }
            Record::Tag { label, commit_id } => {
                self.tags.insert(label, Hash(commit_id));
            }
            Record::Untag { label } => {
                self.tags.remove(&label);
            }
            Record::SetCurr(curr) => {
                self.curr = curr;
            }
            Record::SetRef { peer_id, commit_id } => {
                self.refs.insert(peer_id, Hash(commit_id));
            }
            Record::PutKey { hash, key } => {
                self.keystore.lock().insert(Hash(hash), key);
            }
            Record::Ignore(pattern) => {
                self.ignores.push(Pattern::new(&pattern));
            }
        }
    }

    fn persist(&mut self, record: Record) -> Result<()> {
        log::append(&mut self.sink, &record)?;
        self.apply(record);
        Ok(())
    }

    fn require_writable(&self) -> Result<()> {
        if self.become_peer.is_some() {
            Err(CatalogError::ReadOnlyView)
        } else {
            Ok(())
        }
    }

    // -- reference grammar --------------------------------------------

    pub fn resolve(&self, rev: &str) -> Result<ResolvedRef> {
        if rev.eq_ignore_ascii_case("HEAD") {
            return self
                .effective_head()
                .map(ResolvedRef::Commit)
                .ok_or_else(|| CatalogError::NotFound("HEAD".into()));
        }
        if rev.eq_ignore_ascii_case("CURR") {
            return Ok(ResolvedRef::Curr);
        }
        if let Some(id) = self.tags.get(&rev.to_uppercase()) {
            return Ok(ResolvedRef::Commit(*id));
        }

        let matches: Vec<CommitId> = self
            .commits
            .keys()
            .filter(|id| commit_id_has_prefix(id, rev))
            .copied()
            .collect();

        match matches.len() {
            0 => Err(CatalogError::NotFound(rev.to_string())),
            1 => Ok(ResolvedRef::Commit(matches[0])),
            n => Err(CatalogError::AmbiguousRef(rev.to_string(), n)),
        }
    }

    fn effective_head(&self) -> Option<CommitId> {
        match &self.become_peer {
            Some(peer) => self.refs.get(peer).copied(),
            None => self.head,
        }
    }

    fn entries_for(&self, resolved: ResolvedRef) -> Result<&BTreeMap<String, Entry>> {
        match resolved {
            ResolvedRef::Curr => Ok(&self.curr),
            ResolvedRef::Commit(id) => self
                .trees
                .get(&id)
                .ok_or_else(|| CatalogError::NotFound(id.to_string())),
        }
    }

    pub fn entries(&self, rev: &str) -> Result<&BTreeMap<String, Entry>> {
        let resolved = self.resolve(rev)?;
        self.entries_for(resolved)
    }

    // -- mutation --------------------------------------------------------

    /// Writes or replaces an entry in `CURR` (the staging step before
    /// `make_commit`).
    pub fn stage(&mut self, entry: Entry) -> Result<()> {
        self.require_writable()?;
        let mut curr = self.curr.clone();
        curr.insert(entry.path.clone(), entry);
        self.persist(Record::SetCurr(curr))
    }

    pub fn unstage(&mut self, path: &str) -> Result<()> {
        self.require_writable()?;
        let mut curr = self.curr.clone();
        curr.remove(path);
        self.persist(Record::SetCurr(curr))
    }

    /// Snapshots `CURR`, computes `root_hash`, and advances `HEAD`.
    /// A no-op (returns `NothingChanged`) if the tree is identical to
    /// `HEAD`'s tree.
    pub fn make_commit(&mut self, message: &str, now: i64) -> Result<CommitId> {
        self.require_writable()?;

        let new_root = root_hash(self.curr.values());
        if let Some(head) = self.head {
            if self.commits[&head].root_hash == new_root {
                return Err(CatalogError::NothingChanged);
            }
        }

        let commit = Commit::new(
            self.head,
            self.local_peer_id.clone(),
            now,
            message.to_string(),
            new_root,
        );
        let id = commit.id;
        self.persist(Record::Commit(commit))?;
        Ok(id)
    }

    pub fn tag(&mut self, rev: &str, label: &str) -> Result<()> {
        self.require_writable()?;
        let upper = label.to_uppercase();
        if upper == "HEAD" || upper == "CURR" {
            return Err(CatalogError::NotFound(format!(
                "{label} is reserved and cannot be used as a tag"
            )));
        }

        let commit_id = match self.resolve(rev)? {
            ResolvedRef::Commit(id) => id,
            ResolvedRef::Curr => {
                return Err(CatalogError::NotFound("CURR is not a commit".into()))
            }
        };

        self.persist(Record::Tag {
            label: upper,
            commit_id: commit_id.0,
        })
    }

    pub fn untag(&mut self, label: &str) -> Result<()> {
        self.require_writable()?;
        let upper = label.to_uppercase();
        if upper == "HEAD" || upper == "CURR" {
            return Err(CatalogError::NotFound(format!(
                "{label} is reserved and cannot be untagged"
            )));
        }
        if !self.tags.contains_key(&upper) {
            return Err(CatalogError::NotFound(label.to_string()));
        }

        self.persist(Record::Untag { label: upper })
    }

    /// Restores the entry at `path` in `CURR` to its state in `rev`.
    /// If `path` is empty, restores the entire tree.
    pub fn reset(&mut self, path: &str, rev: &str, force: bool) -> Result<()> {
        self.require_writable()?;
        let resolved = self.resolve(rev)?;
        let target = self.entries_for(resolved)?.clone();

        if path.is_empty() {
            if !force && self.curr != self.head_tree() {
                return Err(CatalogError::DirtyCurr("/".into()));
            }
            return self.persist(Record::SetCurr(target));
        }

        let path = normalize_path(path);
        if !force {
            let head_entry = self.head_tree().get(&path).cloned();
            let curr_entry = self.curr.get(&path).cloned();
            if curr_entry != head_entry {
                return Err(CatalogError::DirtyCurr(path));
            }
        }

        let mut curr = self.curr.clone();
        match target.get(&path) {
            Some(entry) => {
                curr.insert(path, entry.clone());
            }
            None => {
                curr.remove(&path);
            }
        }
        self.persist(Record::SetCurr(curr))
    }

    fn head_tree(&self) -> BTreeMap<String, Entry> {
        match self.head {
            Some(id) => self.trees.get(&id).cloned().unwrap_or_default(),
            None => BTreeMap::new(),
        }
    }

    pub fn add_ignore(&mut self, pattern: &str) -> Result<()> {
        self.require_writable()?;
        self.persist(Record::Ignore(pattern.to_string()))
    }

    pub fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        self.ignores.iter().any(|p| p.matches(path, is_dir))
    }

    pub fn set_ref(&mut self, peer_id: &str, commit_id: CommitId) -> Result<()> {
        self.persist(Record::SetRef {
            peer_id: peer_id.to_string(),
            commit_id: commit_id.0,
        })
    }

    pub fn get_ref(&self, peer_id: &str) -> Option<CommitId> {
        self.refs.get(peer_id).copied()
    }

    pub fn put_key(&mut self, hash: Hash, key: [u8; 32]) -> Result<()> {
        self.persist(Record::PutKey {
            hash: hash.0,
            key,
        })
    }

    pub fn get_key(&self, hash: &Hash) -> Option<[u8; 32]> {
        self.keystore.lock().get(hash).copied()
    }

    // -- reads -------------------------------------------------------------

    /// Ordered newest-first traversal from `HEAD` along parent links.
    pub fn log(&self) -> Vec<Commit> {
        let mut out = Vec::new();
        let mut node = self.effective_head();
        while let Some(id) = node {
            let commit = self.commits[&id].clone();
            node = commit.parent_id;
            out.push(commit);
        }
        out
    }

    /// Switches the read view of subsequent read operations to
    /// `refs[peer_id]`. Writes fail with `ReadOnlyView` until cleared.
    pub fn become_peer(&mut self, peer_id: &str) -> Result<()> {
        if !self.refs.contains_key(peer_id) {
            return Err(CatalogError::NotFound(peer_id.to_string()));
        }
        self.become_peer = Some(peer_id.to_string());
        Ok(())
    }

    pub fn whoami(&self) -> (&str, Option<&str>) {
        (&self.local_peer_id, self.become_peer.as_deref())
    }

    pub fn become_self(&mut self) {
        self.become_peer = None;
    }

    /// Walk commits from `HEAD` backward, emitting one history entry
    /// per commit in which `path` (or its predecessor under a rename)
    /// changed.
    pub fn history(&self, path: &str) -> Result<Vec<HistoryEntry>> {
        let mut cur = normalize_path(path);
        let mut out = Vec::new();
        let mut node = self.effective_head();

        while let Some(id) = node {
            let commit = &self.commits[&id];
            let Some(parent_id) = commit.parent_id else {
                break;
            };
            let newer = &self.trees[&id];
            let older = &self.trees[&parent_id];

            let newer_entry = newer.get(&cur);
            let older_entry = older.get(&cur);

            match (newer_entry, older_entry) {
                (Some(n), Some(o)) if n.hash == o.hash => {}
                (Some(_), Some(_)) => out.push(HistoryEntry {
                    head_commit: id,
                    next_commit: parent_id,
                    mask: HistoryMask::Modified,
                    moved_to: None,
                    was_previously_at: None,
                }),
                (Some(n), None) => {
                    if let Some((old_path, _)) = older
                        .iter()
                        .find(|(p, e)| e.hash == n.hash && newer.get(*p).is_none())
                    {
                        out.push(HistoryEntry {
                            head_commit: id,
                            next_commit: parent_id,
                            mask: HistoryMask::Moved,
                            moved_to: Some(cur.clone()),
                            was_previously_at: Some(old_path.clone()),
                        });
                        cur = old_path.clone();
                    } else {
                        out.push(HistoryEntry {
                            head_commit: id,
                            next_commit: parent_id,
                            mask: HistoryMask::Added,
                            moved_to: None,
                            was_previously_at: None,
                        });
                        break;
                    }
                }
                (None, Some(_)) => {
                    out.push(HistoryEntry {
                        head_commit: id,
                        next_commit: parent_id,
                        mask: HistoryMask::Removed,
                        moved_to: None,
                        was_previously_at: None,
                    });
                    break;
                }
                (None, None) => break,
            }

            node = commit.parent_id;
        }

        Ok(out)
    }
}

fn commit_id_has_prefix(id: &CommitId, prefix: &str) -> bool {
    if prefix.len() < 6 {
        return false;
    }
    let hex = id.to_string();
    let b58 = bs58::encode(id.as_bytes()).into_string();
    hex.starts_with(&prefix.to_lowercase()) || b58.starts_with(prefix)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn open_empty() -> CatalogStore<Cursor<Vec<u8>>> {
        CatalogStore::open(Cursor::new(Vec::new()), "local").unwrap()
    }

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

    #[test]
    fn scenario_3_commit_two_files() {
        let mut cat = open_empty();
        cat.stage(entry("/a", b"hello")).unwrap();
        cat.stage(entry("/b", b"world")).unwrap();
        cat.make_commit("first", 0).unwrap();

        assert_eq!(cat.log().len(), 1);

        let head = cat.entries("HEAD").unwrap().clone();
        let curr = cat.entries("CURR").unwrap().clone();
        assert_eq!(head, curr);
    }

    #[test]
    fn scenario_4_rename_history() {
        let mut cat = open_empty();
        cat.stage(entry("/a", b"hello")).unwrap();
        cat.stage(entry("/b", b"world")).unwrap();
        cat.make_commit("first", 0).unwrap();

        cat.unstage("/a").unwrap();
        cat.stage(entry("/c", b"hello")).unwrap();
        cat.make_commit("rename a to c", 1).unwrap();

        let history = cat.history("/c").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].mask, HistoryMask::Moved);
        assert_eq!(history[0].moved_to.as_deref(), Some("/c"));
        assert_eq!(history[0].was_previously_at.as_deref(), Some("/a"));
    }

    #[test]
    fn commit_on_unchanged_tree_is_nothing_changed() {
        let mut cat = open_empty();
        cat.stage(entry("/a", b"hello")).unwrap();
        cat.make_commit("first", 0).unwrap();

        let err = cat.make_commit("first again", 1).unwrap_err();
        assert!(matches!(err, CatalogError::NothingChanged));
    }

    #[test]
    fn tag_and_untag_round_trips() {
        let mut cat = open_empty();
        cat.stage(entry("/a", b"hello")).unwrap();
        cat.make_commit("first", 0).unwrap();

        cat.tag("HEAD", "v1").unwrap();
        assert_eq!(cat.resolve("v1").unwrap(), cat.resolve("HEAD").unwrap());

        cat.untag("v1").unwrap();
        assert!(cat.resolve("v1").is_err());
    }

    #[test]
    fn reset_without_force_rejects_dirty_curr() {
        let mut cat = open_empty();
        cat.stage(entry("/a", b"hello")).unwrap();
        cat.make_commit("first", 0).unwrap();

        cat.stage(entry("/a", b"modified")).unwrap();
        let err = cat.reset("/a", "HEAD", false).unwrap_err();
        assert!(matches!(err, CatalogError::DirtyCurr(_)));

        cat.reset("/a", "HEAD", true).unwrap();
        assert_eq!(cat.curr.get("/a").unwrap().hash, Hash::from_bytes(b"hello"));
    }

    #[test]
    fn become_peer_blocks_writes() {
        let mut cat = open_empty();
        cat.stage(entry("/a", b"hello")).unwrap();
        let id = cat.make_commit("first", 0).unwrap();
        cat.set_ref("bob", id).unwrap();

        cat.become_peer("bob").unwrap();
        let err = cat.make_commit("blocked", 1).unwrap_err();
        assert!(matches!(err, CatalogError::ReadOnlyView));
    }

    #[test]
    fn replay_reconstructs_state() {
        let mut buf = Vec::new();
        {
            let mut cat = CatalogStore::open(Cursor::new(&mut buf), "local").unwrap();
            cat.stage(entry("/a", b"hello")).unwrap();
            cat.make_commit("first", 0).unwrap();
        }

        let cat2 = CatalogStore::open(Cursor::new(buf), "local").unwrap();
        assert_eq!(cat2.log().len(), 1);
    }
}
