use dagkit_cid::Cid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse CAR file: {0}")]
    Parsing(String),

    #[error("invalid CAR file: {0}")]
    InvalidFile(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cbor encoding error: {0}")]
    CborEncode(String),

    #[error("cbor decoding error: {0}")]
    CborDecode(String),

    #[error(transparent)]
    Cid(#[from] dagkit_cid::Error),

    #[error(transparent)]
    Store(#[from] dagkit_blockstore::Error),

    #[error(transparent)]
    Dag(#[from] dagkit_dag::Error),

    /// A CAR frame's body bytes don't hash to its declared CID.
    #[error("car-corrupt: block does not hash to its claimed cid {0}")]
    CarCorrupt(Cid),

    /// `swarm=false` and a block the export needed isn't present locally.
    #[error("not-found: {0}")]
    NotFound(Cid),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
