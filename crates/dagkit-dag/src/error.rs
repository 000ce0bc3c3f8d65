use dagkit_cid::Cid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("encountered empty input, nothing to build a dag from")]
    EmptyInput,

    #[error(transparent)]
    Chunker(#[from] dagkit_chunker::Error),

    #[error(transparent)]
    Node(#[from] dagkit_cid::Error),

    #[error(transparent)]
    Store(#[from] dagkit_blockstore::Error),

    #[error("traversal of {cid} failed after retry: {message}")]
    FetchFailed { cid: Cid, message: String },

    #[error("traversal cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
