//! Read-through local blob cache in front of a remote `ObjectStore`,
//! matching spec.md §6's `<repo>/.brig/objects/` ("optional local blob
//! cache mirror"). Grounded on `infinitree::backends::cache::Cache`,
//! stripped of its `tokio`-driven async write-behind and in-flight
//! transaction tracking (not needed here: `put` always fans out to
//! both tiers synchronously, matching the rest of the crate's
//! blocking-I/O discipline) but keeping its core shape: an
//! access-ordered LRU of locally mirrored blobs, evicted down to a
//! byte budget whenever a new blob is added.

use brig_core::{
    hash::Hash,
    object::{BlobReader, ObjectStore, Result},
};
use parking_lot::Mutex;

use crate::Directory;

pub struct Cache<Upstream> {
    local: Directory,
    upstream: Upstream,
    resident: Mutex<lru::LruCache<Hash, usize>>,
    byte_budget: usize,
    resident_bytes: Mutex<usize>,
}

impl<Upstream: ObjectStore> Cache<Upstream> {
    pub fn new(
        local_dir: impl AsRef<std::path::Path>,
        byte_budget: usize,
        upstream: Upstream,
    ) -> Result<Self> {
        let local = Directory::new(local_dir)?;
        Ok(Cache {
            local,
            upstream,
            resident: Mutex::new(lru::LruCache::unbounded()),
            byte_budget,
            resident_bytes: Mutex::new(0),
        })
    }

    fn remember(&self, hash: Hash, len: usize) {
        let mut resident = self.resident.lock();
        let mut bytes = self.resident_bytes.lock();

        if resident.put(hash, len).is_none() {
            *bytes += len;
        }

        while *bytes > self.byte_budget {
            match resident.pop_lru() {
                Some((evict_hash, evict_len)) => {
                    let _ = self.local.unpin(&evict_hash);
                    *bytes = bytes.saturating_sub(evict_len);
                    tracing::debug!(hash = %evict_hash, "evicted blob from local cache mirror");
                }
                None => break,
            }
        }
    }
}

impl<Upstream: ObjectStore> ObjectStore for Cache<Upstream> {
    fn put(&self, hash: &Hash, blob: &[u8]) -> Result<()> {
        self.local.put(hash, blob)?;
        self.remember(*hash, blob.len());
        self.upstream.put(hash, blob)
    }

    fn get(&self, hash: &Hash) -> Result<Box<dyn BlobReader>> {
        if self.resident.lock().get(hash).is_some() {
            return self.local.get(hash);
        }

        match self.local.get(hash) {
            Ok(reader) => Ok(reader),
            Err(_) => {
                let mut reader = self.upstream.get(hash)?;
                let mut bytes = Vec::new();
                std::io::Read::read_to_end(&mut reader, &mut bytes)?;
                tracing::debug!(%hash, "fetched blob from upstream, populating local mirror");
                self.local.put(hash, &bytes)?;
                self.remember(*hash, bytes.len());
                self.local.get(hash)
            }
        }
    }

    fn has(&self, hash: &Hash) -> Result<bool> {
        if self.local.has(hash)? {
            return Ok(true);
        }
        self.upstream.has(hash)
    }

    fn pin(&self, hash: &Hash) -> Result<()> {
        self.upstream.pin(hash)
    }

    fn unpin(&self, hash: &Hash) -> Result<()> {
        self.resident.lock().pop(hash);
        let _ = self.local.unpin(hash);
        self.upstream.unpin(hash)
    }
}
