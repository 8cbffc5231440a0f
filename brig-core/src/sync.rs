//! Fetch a remote catalog snapshot, diff it against `CURR`, and apply
//! the plan atomically per path. Grounded on
//! `original_source/cmd/vcs_handlers.go`'s `handleSync`, translated
//! from goroutine-per-sync to a synchronous call the caller drives
//! from its own worker pool (the rest of the core doesn't bring in an
//! async runtime).

use crate::{
    catalog::{CatalogStore, Entry},
    diff::{self, Diff},
    error::{Error, Result},
    hash::Hash,
    object::ObjectStore,
};
use std::{
    collections::BTreeMap,
    io::{Read, Seek, Write},
};

/// Whether a successful sync should commit `CURR` on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    Manual,
    AutoCommit,
}

/// An entry plus the per-blob key needed to read it, as surfaced by a
/// remote peer during fetch. The blob store never sees this key; it
/// only ever travels peer-to-peer and into the local keystore.
#[derive(Clone, Debug)]
pub struct RemoteEntry {
    pub entry: Entry,
    pub key: [u8; 32],
}

/// Pulls a remote peer's current `CURR`/`HEAD` snapshot. Implemented
/// in terms of [`crate::peer`] in a full daemon; kept abstract here so
/// `sync` stays testable without a live conversation.
pub trait RemoteFetch: Send + Sync {
    fn fetch(&self, remote_name: &str) -> anyhow::Result<BTreeMap<String, RemoteEntry>>;
}

fn short_hash(hash: &Hash) -> String {
    hash.short_b58()
}

/// Runs one sync pass against `remote_name`, returning the diff that
/// was applied. `remote_cache` holds the last fetched snapshot per
/// remote; a live fetch (when `fetch` is true) refreshes it, a stale
/// read (when false) makes diffing the prior snapshot without calling
/// out to the network, matching step 2 of `Sync`'s algorithm
/// (`MakeDiff(self, remote, CURR, HEAD_remote, false)`). Diffs against
/// `remote` three-way, using local `HEAD` as the common-ancestor tree
/// (see [`diff::make_diff`]), and drops conflicts that were already
/// materialized by a previous sync so repeated syncs against an
/// unchanged remote are idempotent.
#[allow(clippy::too_many_arguments)]
pub fn sync<S: Read + Write + Seek>(
    catalog: &mut CatalogStore<S>,
    store: &dyn ObjectStore,
    remote_cache: &mut BTreeMap<String, BTreeMap<String, RemoteEntry>>,
    remote_name: &str,
    fetch: bool,
    fetcher: Option<&dyn RemoteFetch>,
    local_peer_id: &str,
    mode: SessionMode,
    now: i64,
) -> Result<Diff> {
    if fetch {
        let fetcher = fetcher.ok_or_else(|| {
            Error::Internal("fetch requested but no RemoteFetch provided".to_string())
        })?;
        let snapshot = fetcher
            .fetch(remote_name)
            .map_err(|e| Error::Internal(e.to_string()))?;
        remote_cache.insert(remote_name.to_string(), snapshot);
    }

    let remote = remote_cache
        .get(remote_name)
        .ok_or_else(|| Error::NotFound(remote_name.to_string()))?;
    let remote_entries: BTreeMap<String, Entry> = remote
        .iter()
        .map(|(p, r)| (p.clone(), r.entry.clone()))
        .collect();

    let local_entries = catalog.entries("CURR")?.clone();
    // HEAD is CURR's own last committed point, the natural three-way
    // merge base for its uncommitted edits: a local-only entry CURR
    // gained since HEAD hasn't been exposed to `remote` yet and must
    // not be deleted just because `remote` lacks it too (spec.md §8
    // scenario 5). Before the first commit HEAD doesn't exist yet,
    // which means every path in CURR is unsynced by definition, so an
    // empty tree stands in for it rather than `None` (which would fall
    // back to the plain two-way reading and delete it).
    let ancestor_entries = catalog.entries("HEAD").ok().cloned().unwrap_or_default();
    let mut d = diff::make_diff(&local_entries, &remote_entries, &[], Some(&ancestor_entries));

    // A conflict already materialized as `<path>.conflict.<remote>.<hash>`
    // needs no further action; re-running sync against an unchanged
    // remote must produce an empty diff (spec.md §8 idempotence).
    d.conflict.retain(|pair| {
        let conflict_path = format!(
            "{}.conflict.{}.{}",
            pair.dst.path,
            remote_name,
            short_hash(&pair.dst.hash)
        );
        local_entries
            .get(&conflict_path)
            .map(|e| e.hash != pair.dst.hash)
            .unwrap_or(true)
    });

    for added in d.added.iter().chain(d.moved.iter().map(|p| &p.dst)) {
        ensure_blob_available(catalog, store, remote, added)?;
        catalog.stage(added.clone())?;
    }
    for pair in &d.moved {
        catalog.unstage(&pair.src.path)?;
    }
    for merged in d.merged.iter().map(|p| &p.dst) {
        ensure_blob_available(catalog, store, remote, merged)?;
        catalog.stage(merged.clone())?;
    }
    for removed in &d.removed {
        catalog.unstage(&removed.path)?;
    }
    for pair in &d.conflict {
        ensure_blob_available(catalog, store, remote, &pair.dst)?;
        let conflict_path = format!(
            "{}.conflict.{}.{}",
            pair.dst.path,
            remote_name,
            short_hash(&pair.dst.hash)
        );
        let mut conflict_entry = pair.dst.clone();
        conflict_entry.path = conflict_path;
        catalog.stage(conflict_entry)?;
        // the unsuffixed path keeps the local copy: no write needed.
    }

    if mode == SessionMode::AutoCommit {
        let message = format!("sync from {remote_name}");
        match catalog.make_commit(&message, now) {
            Ok(_) => {}
            Err(crate::catalog::CatalogError::NothingChanged) => {}
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        peer = local_peer_id,
        remote = remote_name,
        added = d.added.len(),
        removed = d.removed.len(),
        moved = d.moved.len(),
        conflict = d.conflict.len(),
        "sync complete"
    );

    Ok(d)
}

fn ensure_blob_available<S: Read + Write + Seek>(
    catalog: &mut CatalogStore<S>,
    store: &dyn ObjectStore,
    remote: &BTreeMap<String, RemoteEntry>,
    entry: &Entry,
) -> Result<()> {
    let remote_entry = remote
        .get(&entry.path)
        .ok_or_else(|| Error::NotFound(entry.path.clone()))?;

    let reader = store.get(&entry.hash)?;
    crate::bit::Reader::new(reader, &crate::bit::Key(remote_entry.key))
        .map_err(Error::Framing)?;

    catalog.put_key(entry.hash, remote_entry.key)?;
    Ok(())
}
