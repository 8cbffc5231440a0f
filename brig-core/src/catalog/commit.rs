use crate::hash::Hash;
use serde::{Deserialize, Serialize};

pub type CommitId = Hash;
pub type PeerId = String;

/// An immutable snapshot of the entry tree with a message and
/// optional tags. `id` is a hash over the other fields (excluding
/// `tags`, which live in a separate label -> commit map), grounded on
/// the teacher's `Commit<CustomData>` / `CommitMetadata<CustomData>`
/// pair in `tree/commit.rs`, specialized away from its generic
/// `CustomData` payload to brig's concrete fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub parent_id: Option<CommitId>,
    pub author_peer_id: PeerId,
    pub date: i64,
    pub message: String,
    pub root_hash: Hash,
}

impl Commit {
    pub fn new(
        parent_id: Option<CommitId>,
        author_peer_id: PeerId,
        date: i64,
        message: String,
        root_hash: Hash,
    ) -> Self {
        let mut hasher = blake3::Hasher::new();
        if let Some(parent) = &parent_id {
            hasher.update(parent.as_bytes());
        }
        hasher.update(author_peer_id.as_bytes());
        hasher.update(&date.to_le_bytes());
        hasher.update(message.as_bytes());
        hasher.update(root_hash.as_bytes());

        let mut id = [0u8; 32];
        id.copy_from_slice(hasher.finalize().as_bytes());

        Commit {
            id: Hash(id),
            parent_id,
            author_peer_id,
            date,
            message,
            root_hash,
        }
    }
}
