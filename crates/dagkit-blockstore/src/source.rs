use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dagkit_cid::Cid;

use crate::{BlockSource, BlockStore, Error, Result};

/// Adapts a local [`BlockStore`] into a [`BlockSource`], the source a
/// traversal uses when nothing remote is configured. A miss is reported as
/// [`Error::NotFound`], never as unavailable or timed out, since a purely
/// local lookup has nothing to wait on.
pub struct LocalBlockSource<S> {
    store: Arc<S>,
}

impl<S> LocalBlockSource<S> {
    pub fn new(store: Arc<S>) -> Self {
        LocalBlockSource { store }
    }
}

#[async_trait::async_trait]
impl<S: BlockStore> BlockSource for LocalBlockSource<S> {
    async fn fetch(&self, cid: &Cid, _timeout: Duration) -> Result<Vec<u8>> {
        match self.store.get(cid)? {
            Some(data) => Ok(data),
            None => Err(Error::NotFound(*cid)),
        }
    }
}

/// A [`BlockSource`] wrapper that fails the first `flaky_attempts` fetches
/// for any given CID before serving the wrapped source's answer, used to
/// exercise the traversal engine's single-retry semantics in tests.
pub struct FlakyBlockSource<S> {
    inner: S,
    flaky_attempts: usize,
    attempts: AtomicUsize,
}

impl<S> FlakyBlockSource<S> {
    pub fn new(inner: S, flaky_attempts: usize) -> Self {
        FlakyBlockSource {
            inner,
            flaky_attempts,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl<S: BlockSource + Send + Sync> BlockSource for FlakyBlockSource<S> {
    async fn fetch(&self, cid: &Cid, timeout: Duration) -> Result<Vec<u8>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.flaky_attempts {
            return Err(Error::Unavailable(*cid, "injected failure".to_string()));
        }
        self.inner.fetch(cid, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBlockStore;
    use dagkit_cid::cid_for;

    #[tokio::test]
    async fn local_source_serves_resident_blocks() {
        let store = Arc::new(MemoryBlockStore::new());
        let data = b"payload".to_vec();
        let cid = cid_for(&data);
        store.put(cid, data.clone()).unwrap();
        let source = LocalBlockSource::new(store);
        let fetched = source.fetch(&cid, Duration::from_millis(50)).await.unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn local_source_reports_not_found() {
        let store = Arc::new(MemoryBlockStore::new());
        let source = LocalBlockSource::new(store);
        let cid = cid_for(b"missing");
        let err = source.fetch(&cid, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn flaky_source_fails_then_succeeds() {
        let store = Arc::new(MemoryBlockStore::new());
        let data = b"payload".to_vec();
        let cid = cid_for(&data);
        store.put(cid, data.clone()).unwrap();
        let inner = LocalBlockSource::new(store);
        let flaky = FlakyBlockSource::new(inner, 1);

        let first = flaky.fetch(&cid, Duration::from_millis(50)).await;
        assert!(first.is_err());
        let second = flaky.fetch(&cid, Duration::from_millis(50)).await.unwrap();
        assert_eq!(second, data);
    }
}
