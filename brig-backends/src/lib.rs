//! Concrete [`brig_core::object::ObjectStore`] backends for `brig`:
//! [`Directory`] (local disk), [`InMemory`] (test/embedded daemon
//! use), [`HttpCas`] (remote content-addressable HTTP store), and
//! [`Cache`] (a local `Directory` mirror in front of any of the
//! above).
//!
//! Split out from `brig-core` the way the teacher splits
//! `infinitree-backends` from `infinitree`, so pulling in `reqwest` is
//! opt-in for consumers that only need the framing and catalog logic.
//! Everything here is synchronous, matching `brig-core`'s no-async-
//! runtime design: spec.md §5's suspension-point discipline assumes
//! blocking calls the caller schedules on its own worker pool, not
//! futures.
#![forbid(unsafe_code)]
#![deny(
    arithmetic_overflow,
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications,
    rustdoc::bare_urls,
    rustdoc::broken_intra_doc_links,
    rustdoc::invalid_codeblock_attributes,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::private_intra_doc_links
)]
#![deny(clippy::all)]

mod cache;
mod directory;
mod http_cas;
mod in_memory;

pub use cache::Cache;
pub use directory::Directory;
pub use http_cas::HttpCas;
pub use in_memory::InMemory;
