use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("progress channel has no receivers left")]
    NoReceivers,
}

pub type Result<T> = std::result::Result<T, Error>;
