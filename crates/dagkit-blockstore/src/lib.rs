//! Local and networked block storage for dagkit.
//!
//! [`BlockStore`] is the synchronous, always-local interface a DAG builder
//! writes into and a CAR exporter reads from. [`BlockSource`] is its async
//! counterpart: something a concurrent traversal can pull blocks from that
//! may not be resident locally (a remote peer, a slow disk), and that may
//! legitimately time out rather than fail outright.

mod error;
mod memory;
mod source;

pub use dagkit_cid::Cid;
pub use error::{Error, Result};
pub use memory::MemoryBlockStore;
pub use source::{FlakyBlockSource, LocalBlockSource};

use std::time::Duration;

/// Synchronous local block storage.
pub trait BlockStore: Send + Sync {
    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>>;

    fn put(&self, cid: Cid, data: Vec<u8>) -> Result<()>;

    fn has(&self, cid: &Cid) -> Result<bool> {
        Ok(self.get(cid)?.is_some())
    }

    fn delete(&self, cid: &Cid) -> Result<()>;

    /// Bulk put, used by CAR import and the DAG builder's flush path.
    fn put_many(&self, blocks: Vec<(Cid, Vec<u8>)>) -> Result<()> {
        for (cid, data) in blocks {
            self.put(cid, data)?;
        }
        Ok(())
    }
}

impl<T: BlockStore + ?Sized> BlockStore for std::sync::Arc<T> {
    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>> {
        (**self).get(cid)
    }

    fn put(&self, cid: Cid, data: Vec<u8>) -> Result<()> {
        (**self).put(cid, data)
    }

    fn delete(&self, cid: &Cid) -> Result<()> {
        (**self).delete(cid)
    }
}

/// Async, possibly-networked block retrieval. `fetch` returns
/// [`Error::Unavailable`] or [`Error::Timeout`] rather than panicking or
/// hanging when a block cannot be produced within `timeout`.
#[async_trait::async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch(&self, cid: &Cid, timeout: Duration) -> Result<Vec<u8>>;
}
