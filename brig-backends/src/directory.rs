//! Local-disk content-addressed blob store: one file per hash under a
//! target directory. Grounded directly on
//! `infinitree::backends::Directory` (read-through LRU over a flat
//! file-per-object directory), with `ObjectId` replaced by
//! `brig_core::hash::Hash` and `Backend::{write_object,read_object,delete}`
//! replaced by `ObjectStore::{put,get,has}`.

use brig_core::{
    hash::Hash,
    object::{BlobReader, ObjectError, ObjectStore, Result},
};
use lru::LruCache;
use parking_lot::Mutex;
use std::{
    fs,
    io::Cursor,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Default number of recently-read blobs kept buffered in memory,
/// matching the teacher's `Directory::new` default open-file limit.
const DEFAULT_CACHE_LIMIT: usize = 256;

#[derive(Clone)]
pub struct Directory {
    target: PathBuf,
    read_cache: Arc<Mutex<LruCache<Hash, Arc<Vec<u8>>>>>,
}

impl Directory {
    /// Equivalent to `Directory::with_cache_limit(target, 256)`.
    pub fn new(target: impl AsRef<Path>) -> Result<Self> {
        Self::with_cache_limit(target, DEFAULT_CACHE_LIMIT)
    }

    pub fn with_cache_limit(target: impl AsRef<Path>, limit: usize) -> Result<Self> {
        fs::create_dir_all(&target)?;
        let limit = NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::new(1).unwrap());
        Ok(Directory {
            target: target.as_ref().into(),
            read_cache: Arc::new(Mutex::new(LruCache::new(limit))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.target
    }

    fn object_path(&self, hash: &Hash) -> PathBuf {
        self.target.join(hash.to_string())
    }
}

impl ObjectStore for Directory {
    fn put(&self, hash: &Hash, blob: &[u8]) -> Result<()> {
        fs::write(self.object_path(hash), blob)?;
        self.read_cache.lock().put(*hash, Arc::new(blob.to_vec()));
        tracing::debug!(%hash, bytes = blob.len(), "wrote blob to directory store");
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Box<dyn BlobReader>> {
        if let Some(cached) = self.read_cache.lock().get(hash) {
            return Ok(Box::new(Cursor::new(cached.as_ref().clone())));
        }

        let path = self.object_path(hash);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ObjectError::BlobMissing(*hash)
            } else {
                ObjectError::Io(e)
            }
        })?;

        self.read_cache.lock().put(*hash, Arc::new(bytes.clone()));
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn has(&self, hash: &Hash) -> Result<bool> {
        if self.read_cache.lock().contains(hash) {
            return Ok(true);
        }
        Ok(self.object_path(hash).exists())
    }

    fn unpin(&self, hash: &Hash) -> Result<()> {
        self.read_cache.lock().pop(hash);
        let path = self.object_path(hash);
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(%hash, "unpinned blob from directory store");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectError::Io(e)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Read;

    #[test]
    fn write_read_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Directory::new(dir.path()).unwrap();

        let hash = Hash::from_bytes(b"some blob");
        store.put(&hash, b"some blob").unwrap();
        assert!(store.has(&hash).unwrap());

        let mut out = Vec::new();
        store.get(&hash).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"some blob");

        store.unpin(&hash).unwrap();
        assert!(!store.has(&hash).unwrap());
    }

    #[test]
    fn missing_blob_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = Directory::new(dir.path()).unwrap();
        let hash = Hash::from_bytes(b"nope");
        assert!(matches!(store.get(&hash), Err(ObjectError::BlobMissing(_))));
    }

    #[test]
    fn reopening_the_same_directory_sees_prior_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let hash = Hash::from_bytes(b"persisted");
        {
            let store = Directory::new(dir.path()).unwrap();
            store.put(&hash, b"persisted").unwrap();
        }

        let store = Directory::new(dir.path()).unwrap();
        assert!(store.has(&hash).unwrap());
    }
}
