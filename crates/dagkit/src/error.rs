use dagkit_cid::Cid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not-a-file: {0}")]
    NotAFile(std::path::PathBuf),

    #[error("not-found: {0}")]
    NotFound(Cid),

    #[error("fetch of {cid} timed out after {timeout_secs}s")]
    Timeout { cid: Cid, timeout_secs: u64 },

    #[error("malformed snapshot line: {0}")]
    MalformedSnapshot(String),

    #[error(transparent)]
    Cid(#[from] dagkit_cid::Error),

    #[error(transparent)]
    Store(#[from] dagkit_blockstore::Error),

    #[error(transparent)]
    Chunker(#[from] dagkit_chunker::Error),

    #[error(transparent)]
    Dag(#[from] dagkit_dag::Error),

    #[error(transparent)]
    Car(#[from] dagkit_car::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
