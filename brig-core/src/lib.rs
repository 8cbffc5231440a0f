//! `brig-core`: the core subsystems of a decentralized, encrypted,
//! peer-synchronized file store — stream cipher framing, the object
//! store client seam, the versioned metadata catalog, the diff and
//! sync engines, and the authenticated peer channel. Concrete object
//! store backends live in the separate `brig-backends` crate.

#[macro_use]
extern crate serde_derive;

pub mod bit;
pub mod catalog;
pub mod config;
pub mod diff;
pub mod error;
pub mod hash;
pub mod identity;
pub mod object;
pub mod peer;
pub mod remote;
pub mod repo;
pub mod rpc;
pub mod sync;

pub use error::{Error, Result};
pub use hash::Hash;
pub use repo::Repo;

pub use anyhow;

/// `rmp-serde` is the crate-wide wire and on-disk encoding (catalog
/// log records, RPC frames) — one choice everywhere rather than a
/// different serializer per subsystem.
pub(crate) fn serialize_to_vec<T: serde::Serialize>(
    value: &T,
) -> std::result::Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec(value)
}

pub(crate) fn deserialize_from_slice<'a, T: serde::Deserialize<'a>>(
    bytes: &'a [u8],
) -> std::result::Result<T, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}

/// Routes `tracing` spans to the test harness's captured output for
/// tests exercising multi-step flows (sync, peer authentication).
/// Idempotent: safe to call from every test in a module.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
