use std::collections::HashMap;

use dagkit_cid::Cid;
use parking_lot::RwLock;

use crate::{BlockStore, Result};

/// A thread-safe in-memory block store, the default for tests and for
/// single-process use of the DAG builder.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<Cid, Vec<u8>>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockStore for MemoryBlockStore {
    fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>> {
        Ok(self.blocks.read().get(cid).cloned())
    }

    fn put(&self, cid: Cid, data: Vec<u8>) -> Result<()> {
        self.blocks.write().insert(cid, data);
        Ok(())
    }

    fn delete(&self, cid: &Cid) -> Result<()> {
        self.blocks.write().remove(cid);
        Ok(())
    }
}
