//! Bounded-concurrency DAG traversal with dynamic work discovery.
//!
//! Each visited block is fetched at most twice (the original attempt plus
//! one retry) before its failure is surfaced as a [`TraversalEvent::Failed`]
//! message rather than aborting the whole walk. Output order is whatever
//! order blocks finish fetching in, not traversal order; the `visited` set
//! guarantees each reachable CID is fetched exactly once regardless of how
//! many parents link to it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use dagkit_blockstore::BlockSource;
use dagkit_cid::{Cid, Node};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// One outcome of a traversal: a fetched block, or a CID whose fetch failed
/// after retrying once.
#[derive(Debug, Clone)]
pub enum TraversalEvent {
    Block { cid: Cid, data: Vec<u8> },
    Failed { cid: Cid, message: String },
}

/// Live counters a progress reporter can sample: how many CIDs have been
/// discovered so far, and how many have finished fetching (successfully or
/// not). The walk is done once `completed == scheduled` and the event
/// channel has closed.
#[derive(Debug, Default)]
pub struct TraversalProgress {
    pub scheduled: AtomicU64,
    pub completed: AtomicU64,
}

impl TraversalProgress {
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

/// Tunables for a traversal run.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    pub concurrency: usize,
    pub fetch_timeout: Duration,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        TraversalConfig {
            concurrency: 8,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// A running traversal: the event stream plus the progress counters it's
/// updating as it goes.
pub struct Traversal {
    pub events: mpsc::Receiver<TraversalEvent>,
    pub progress: Arc<TraversalProgress>,
}

/// Walk the DAG reachable from `roots`, fetching blocks through `source`
/// with up to `config.concurrency` fetches in flight at once. Returns
/// immediately; blocks arrive on the returned channel as they're fetched.
pub fn traverse<S>(
    roots: Vec<Cid>,
    source: Arc<S>,
    config: TraversalConfig,
    cancel: CancellationToken,
) -> Traversal
where
    S: BlockSource + 'static,
{
    let (out_tx, out_rx) = mpsc::channel(config.concurrency.max(1) * 4);
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let visited = Arc::new(DashSet::new());
    let progress = Arc::new(TraversalProgress::default());

    for root in roots {
        if visited.insert(root) {
            progress.scheduled.fetch_add(1, Ordering::Relaxed);
            spawn_fetch(
                root,
                source.clone(),
                semaphore.clone(),
                visited.clone(),
                progress.clone(),
                out_tx.clone(),
                config.fetch_timeout,
                cancel.clone(),
            );
        }
    }
    drop(out_tx);

    Traversal {
        events: out_rx,
        progress,
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_fetch<S>(
    cid: Cid,
    source: Arc<S>,
    semaphore: Arc<Semaphore>,
    visited: Arc<DashSet<Cid>>,
    progress: Arc<TraversalProgress>,
    out_tx: mpsc::Sender<TraversalEvent>,
    timeout: Duration,
    cancel: CancellationToken,
) where
    S: BlockSource + 'static,
{
    tokio::spawn(async move {
        let Ok(_permit) = semaphore.acquire_owned().await else {
            return;
        };

        if cancel.is_cancelled() {
            progress.completed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut result = source.fetch(&cid, timeout).await;
        if result.is_err() && !cancel.is_cancelled() {
            // single retry, per this engine's failure contract
            result = source.fetch(&cid, timeout).await;
        }

        match result {
            Ok(data) => {
                if let Ok(Node::Branch { links, .. }) = dagkit_cid::decode(&data) {
                    for link in links {
                        if visited.insert(link.cid) {
                            progress.scheduled.fetch_add(1, Ordering::Relaxed);
                            spawn_fetch(
                                link.cid,
                                source.clone(),
                                semaphore.clone(),
                                visited.clone(),
                                progress.clone(),
                                out_tx.clone(),
                                timeout,
                                cancel.clone(),
                            );
                        }
                    }
                }
                let _ = out_tx.send(TraversalEvent::Block { cid, data }).await;
            }
            Err(e) => {
                let _ = out_tx
                    .send(TraversalEvent::Failed {
                        cid,
                        message: format!("Failed to get {cid}: {e}"),
                    })
                    .await;
            }
        }

        progress.completed.fetch_add(1, Ordering::Relaxed);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagkit_blockstore::{BlockStore, Error as StoreError, LocalBlockSource, MemoryBlockStore};
    use dagkit_cid::{encode_branch, encode_leaf, Link};
    use std::collections::HashSet;

    fn build_small_dag(store: &MemoryBlockStore) -> (Cid, Vec<Cid>) {
        let (leaf_a_cid, leaf_a) = encode_leaf(b"a".to_vec()).unwrap();
        let (leaf_b_cid, leaf_b) = encode_leaf(b"b".to_vec()).unwrap();
        store.put(leaf_a_cid, leaf_a.clone()).unwrap();
        store.put(leaf_b_cid, leaf_b.clone()).unwrap();

        let links = vec![
            Link {
                cid: leaf_a_cid,
                block_size: leaf_a.len() as u64,
                file_size: 1,
            },
            Link {
                cid: leaf_b_cid,
                block_size: leaf_b.len() as u64,
                file_size: 1,
            },
        ];
        let (root_cid, root_bytes) = encode_branch(&links).unwrap();
        store.put(root_cid, root_bytes).unwrap();

        (root_cid, vec![root_cid, leaf_a_cid, leaf_b_cid])
    }

    #[tokio::test]
    async fn visits_every_reachable_block_exactly_once() {
        let store = MemoryBlockStore::new();
        let (root, expected) = build_small_dag(&store);
        let source = Arc::new(LocalBlockSource::new(Arc::new(store)));

        let mut traversal = traverse(
            vec![root],
            source,
            TraversalConfig::default(),
            CancellationToken::new(),
        );

        let mut seen = HashSet::new();
        while let Some(event) = traversal.events.recv().await {
            if let TraversalEvent::Block { cid, .. } = event {
                assert!(seen.insert(cid), "cid {cid} visited twice");
            } else {
                panic!("unexpected failure event");
            }
        }

        let expected: HashSet<_> = expected.into_iter().collect();
        assert_eq!(seen, expected);
        assert_eq!(traversal.progress.scheduled(), traversal.progress.completed());
    }

    struct AlwaysFails;

    #[async_trait::async_trait]
    impl BlockSource for AlwaysFails {
        async fn fetch(&self, cid: &Cid, _timeout: Duration) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::Unavailable(*cid, "nope".to_string()))
        }
    }

    #[tokio::test]
    async fn unreachable_root_surfaces_as_failed_event() {
        let cid = dagkit_cid::cid_for(b"missing");
        let source = Arc::new(AlwaysFails);
        let mut traversal = traverse(
            vec![cid],
            source,
            TraversalConfig::default(),
            CancellationToken::new(),
        );
        let event = traversal.events.recv().await.unwrap();
        assert!(matches!(event, TraversalEvent::Failed { .. }));
        assert!(traversal.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancellation_stops_further_fetches() {
        let store = MemoryBlockStore::new();
        let (root, _) = build_small_dag(&store);
        let source = Arc::new(LocalBlockSource::new(Arc::new(store)));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut traversal = traverse(vec![root], source, TraversalConfig::default(), cancel);
        assert!(traversal.events.recv().await.is_none());
    }
}
