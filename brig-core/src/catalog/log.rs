use super::{commit::Commit, entry::Entry};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::{self, Read, Write},
};

/// One durable mutation to the catalog. The log is append-only;
/// replaying it from the start rebuilds all in-memory state. Grounded
/// on the teacher's transaction-log-replay model in `index.rs`,
/// adapted from generic index fields to commit/tag/ref records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) enum Record {
    Commit(Commit),
    Tag { label: String, commit_id: [u8; 32] },
    Untag { label: String },
    SetCurr(BTreeMap<String, Entry>),
    SetRef { peer_id: String, commit_id: [u8; 32] },
    PutKey { hash: [u8; 32], key: [u8; 32] },
    Ignore(String),
}

/// A record is only durable once its length prefix, payload and
/// checksum are all on disk; a record interrupted mid-write (crash,
/// truncation) is simply absent after replay; no partially-applied
/// record is ever visible.
pub(crate) fn append(w: &mut impl Write, record: &Record) -> io::Result<()> {
    let payload = crate::serialize_to_vec(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let checksum = blake3::hash(&payload);

    w.write_all(&(payload.len() as u32).to_le_bytes())?;
    w.write_all(&payload)?;
    w.write_all(checksum.as_bytes())?;
    w.flush()
}

/// Replays every complete, checksum-valid record from `r`, in order.
/// Stops (without error) at the first short read or checksum
/// mismatch, since that is exactly the boundary a crash can leave
/// behind.
pub(crate) fn replay(r: &mut impl Read) -> Vec<Record> {
    let mut records = Vec::new();

    loop {
        let mut len_buf = [0u8; 4];
        if r.read_exact(&mut len_buf).is_err() {
            break;
        }
        let len = u32::from_le_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        if r.read_exact(&mut payload).is_err() {
            break;
        }

        let mut checksum = [0u8; 32];
        if r.read_exact(&mut checksum).is_err() {
            break;
        }
        if blake3::hash(&payload).as_bytes() != &checksum {
            break;
        }

        match crate::deserialize_from_slice::<Record>(&payload) {
            Ok(record) => records.push(record),
            Err(_) => break,
        }
    }

    records
}
