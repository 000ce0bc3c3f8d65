//! `dagkit`: a content-addressed object store and DAG engine. Chunks files
//! into a balanced dag-pb Merkle tree ([`dagkit_dag`]), walks and fetches
//! such trees with bounded concurrency, and reads/writes them as CAR
//! archives ([`dagkit_car`]). This crate is the operation façade over those
//! building blocks plus the `dagkit` CLI binary.

pub mod config;
pub mod error;
pub mod facade;
pub mod piece;
pub mod snapshot;

pub use config::NodeConfig;
pub use error::{Error, Result};
pub use facade::{DagStat, SyncSsOptions};

pub use dagkit_blockstore::{BlockSource, BlockStore, FlakyBlockSource, LocalBlockSource, MemoryBlockStore};
pub use dagkit_cid::Cid;
pub use dagkit_progress::{ProgressEvent, ProgressReporter};
