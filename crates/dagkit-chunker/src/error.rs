use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("encountered empty input, nothing to chunk")]
    EmptyInput,

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("io error while reading input: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
