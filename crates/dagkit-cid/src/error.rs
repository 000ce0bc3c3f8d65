use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed cid: {0}")]
    Cid(#[from] cid::Error),

    #[error("malformed dag-pb block: {0}")]
    Protobuf(#[from] quick_protobuf::Error),

    #[error("unrecognized unixfs data type {0}")]
    UnknownFsKind(u64),

    #[error("leaf node carries {0} links, expected 0")]
    LeafWithLinks(usize),

    #[error("branch node carries inline data")]
    BranchWithData,
}

pub type Result<T> = std::result::Result<T, Error>;
