use dagkit_cid::Cid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("block {0} not found in local store")]
    NotFound(Cid),

    #[error("block {0} unavailable: {1}")]
    Unavailable(Cid, String),

    #[error("block {0} fetch timed out")]
    Timeout(Cid),

    #[error("malformed block for {cid}: {source}")]
    Malformed {
        cid: Cid,
        #[source]
        source: dagkit_cid::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
