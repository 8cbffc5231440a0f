use thiserror::Error;

use crate::{bit, catalog, identity, object, peer, rpc};

/// Crate-wide error type. Individual modules carry their own `thiserror`
/// enum; this type composes them for callers that cross module
/// boundaries (the daemon, the sync engine).
#[derive(Error, Debug)]
pub enum Error {
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

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Framing(#[from] bit::Error),

    #[error(transparent)]
    Object(#[from] object::ObjectError),

    #[error(transparent)]
    Catalog(#[from] catalog::CatalogError),

    #[error(transparent)]
    Peer(#[from] peer::PeerError),

    #[error(transparent)]
    Rpc(#[from] rpc::RpcError),

    #[error(transparent)]
    Identity(#[from] identity::IdentityError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
