//! Thin content-addressed blob store client.
//!
//! The real store (IPFS-like daemon, HTTP CAS, local directory cache)
//! is an external collaborator; this module only defines the seam and
//! an in-memory test double, grounded on the teacher's `Backend` trait
//! and its `InMemoryBackend` test fixture.

use crate::hash::Hash;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    io::{Read, Seek},
    sync::Arc,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("blob missing: {0}")]
    BlobMissing(Hash),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ObjectError>;

/// A seekable blob reader handed back by `get`.
pub trait BlobReader: Read + Seek + Send {}
impl<T: Read + Seek + Send> BlobReader for T {}

/// `Put`/`Get`/`Has`/`Pin`/`Unpin` over a content-addressed store.
///
/// The core always pipes plaintext through [`crate::bit`] before
/// `put`; this trait only ever sees already-encrypted bytes. `put` is
/// idempotent on `hash`. `pin`/`unpin` default to no-ops for backends
/// with no garbage collector of their own, mirroring the teacher's
/// `Backend::preload`/`delete` default bodies.
pub trait ObjectStore: Send + Sync {
    fn put(&self, hash: &Hash, blob: &[u8]) -> Result<()>;
    fn get(&self, hash: &Hash) -> Result<Box<dyn BlobReader>>;
    fn has(&self, hash: &Hash) -> Result<bool>;

    fn pin(&self, _hash: &Hash) -> Result<()> {
        Ok(())
    }

    fn unpin(&self, _hash: &Hash) -> Result<()> {
        Ok(())
    }
}

/// In-memory `ObjectStore`, for tests. Grounded on
/// `infinitree::backends::test::InMemoryBackend`.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    blobs: Arc<RwLock<HashMap<Hash, Vec<u8>>>>,
}

impl ObjectStore for InMemoryStore {
    fn put(&self, hash: &Hash, blob: &[u8]) -> Result<()> {
        self.blobs.write().insert(*hash, blob.to_vec());
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Box<dyn BlobReader>> {
        let blobs = self.blobs.read();
        let blob = blobs
            .get(hash)
            .cloned()
            .ok_or_else(|| ObjectError::BlobMissing(*hash))?;
        Ok(Box::new(std::io::Cursor::new(blob)))
    }

    fn has(&self, hash: &Hash) -> Result<bool> {
        Ok(self.blobs.read().contains_key(hash))
    }
}
