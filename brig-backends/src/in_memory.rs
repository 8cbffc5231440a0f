//! Lock-free in-memory `ObjectStore`, for daemons that run against a
//! purely local or test object store without touching disk. Grounded
//! on `infinitree::backends::test::InMemoryBackend`, but backed by
//! `scc::HashMap` (the teacher's own choice for concurrent maps
//! elsewhere, e.g. `infinitree-backends::s3`'s in-flight tracker)
//! rather than a mutex-guarded `std::collections::HashMap`, since this
//! backend is meant to survive concurrent `put`/`get` from multiple
//! sync workers without contending on a single lock.

use brig_core::{
    hash::Hash,
    object::{BlobReader, ObjectError, ObjectStore, Result},
};
use scc::HashMap;
use std::io::Cursor;

#[derive(Default, Clone)]
pub struct InMemory {
    blobs: HashMap<Hash, Vec<u8>>,
}

impl InMemory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for InMemory {
    fn put(&self, hash: &Hash, blob: &[u8]) -> Result<()> {
        let _ = self.blobs.upsert(*hash, blob.to_vec());
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Box<dyn BlobReader>> {
        self.blobs
            .read(hash, |_, v| Box::new(Cursor::new(v.clone())) as Box<dyn BlobReader>)
            .ok_or(ObjectError::BlobMissing(*hash))
    }

    fn has(&self, hash: &Hash) -> Result<bool> {
        Ok(self.blobs.contains(hash))
    }

    fn unpin(&self, hash: &Hash) -> Result<()> {
        self.blobs.remove(hash);
        tracing::debug!(%hash, "unpinned blob from in-memory store");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemory::new();
        let hash = Hash::from_bytes(b"some blob");
        store.put(&hash, b"some blob").unwrap();

        let mut out = Vec::new();
        store.get(&hash).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"some blob");
    }

    #[test]
    fn unpin_removes_the_blob() {
        let store = InMemory::new();
        let hash = Hash::from_bytes(b"gone soon");
        store.put(&hash, b"gone soon").unwrap();
        store.unpin(&hash).unwrap();
        assert!(!store.has(&hash).unwrap());
    }
}
