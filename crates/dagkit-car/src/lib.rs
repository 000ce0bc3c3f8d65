//! CAR (Content Addressable aRchive) reader and writer, with a deterministic
//! padding scheme for piece-commitment-aligned output sizes.

mod error;
mod pad;
mod util;

pub use dagkit_cid::Cid;
pub use error::{Error, Result};
pub use pad::pad;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dagkit_blockstore::{BlockSource, BlockStore};
use dagkit_dag::{traverse, TraversalConfig, TraversalEvent};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use util::{ld_read, ld_write, read_node};

/// CAR file header: `{ roots: [CID], version: 1 }`, CBOR-encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CarHeader {
    pub roots: Vec<Cid>,
    pub version: u64,
}

impl CarHeader {
    pub fn new(roots: Vec<Cid>) -> Self {
        CarHeader { roots, version: 1 }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        cbor4ii::serde::to_vec(Vec::new(), self).map_err(|e| Error::CborEncode(e.to_string()))
    }

    fn from_bytes(buf: &[u8]) -> Result<Self> {
        cbor4ii::serde::from_slice(buf).map_err(|e| Error::CborDecode(e.to_string()))
    }
}

/// A decoded CAR node: its CID and its exact block bytes.
#[derive(Debug, Clone)]
pub struct CarBlock {
    pub cid: Cid,
    pub data: Vec<u8>,
}

/// Streams blocks out of a CAR-framed reader, one at a time.
pub struct CarReader<R> {
    reader: R,
    pub header: CarHeader,
}

impl<R> CarReader<R>
where
    R: AsyncRead + Unpin,
{
    pub async fn new(mut reader: R) -> Result<Self> {
        let buf = ld_read(&mut reader)
            .await?
            .ok_or_else(|| Error::Parsing("failed to parse uvarint for header".to_string()))?;
        let header = CarHeader::from_bytes(&buf)?;
        if header.roots.is_empty() {
            return Err(Error::Parsing("empty CAR file: no roots".to_string()));
        }
        if header.version != 1 {
            return Err(Error::InvalidFile("CAR file version must be 1".to_string()));
        }
        Ok(CarReader { reader, header })
    }

    pub async fn next_block(&mut self) -> Result<Option<CarBlock>> {
        let block = read_node(&mut self.reader)
            .await?
            .map(|(cid, data)| CarBlock { cid, data });
        Ok(block)
    }
}

/// Read every block out of a CAR stream into `store`, returning the CAR's
/// declared roots. Writes are batched to keep the store call count small on
/// large archives.
pub async fn import_into<R, S>(reader: R, store: &S) -> Result<Vec<Cid>>
where
    R: AsyncRead + Unpin,
    S: BlockStore,
{
    let mut car = CarReader::new(reader).await?;
    let mut batch = Vec::with_capacity(1000);
    while let Some(block) = car.next_block().await? {
        batch.push((block.cid, block.data));
        if batch.len() >= 1000 {
            store.put_many(std::mem::take(&mut batch))?;
        }
    }
    store.put_many(batch)?;
    Ok(car.header.roots)
}

/// Write a CAR archive rooted at `roots`, read from `source` with up to
/// `batch` fetches in flight at once, then re-serialized in deterministic
/// depth-first preorder regardless of the order blocks actually arrived in.
/// When `pad_output` is set, zero bytes are appended after the archive so
/// its total length satisfies [`pad`]. `swarm` selects network-enabled vs.
/// local-only semantics for `source`: when it's `false`, a block the
/// traversal can't fetch is reported as [`Error::NotFound`] rather than a
/// generic failure (`spec.md` §9).
pub async fn write_car<W, S>(
    writer: &mut W,
    roots: Vec<Cid>,
    source: Arc<S>,
    batch: usize,
    pad_output: bool,
    swarm: bool,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
    S: BlockSource + 'static,
{
    let fetched = prefetch_all(roots.clone(), source, batch, swarm).await?;
    let preorder = preorder_cids(&roots, &fetched);

    let header = CarHeader::new(roots);
    let header_bytes = header.to_bytes()?;
    ld_write(writer, &header_bytes).await?;

    let mut written: u64 = (varint_len(header_bytes.len()) + header_bytes.len()) as u64;
    for cid in preorder {
        let data = fetched
            .get(&cid)
            .expect("preorder cid must have been prefetched");
        let mut frame = cid.to_bytes();
        frame.extend_from_slice(data);
        ld_write(writer, &frame).await?;
        written += (varint_len(frame.len()) + frame.len()) as u64;
    }

    if pad_output {
        let target = pad(written);
        if target > written {
            let zeros = vec![0u8; (target - written) as usize];
            writer.write_all(&zeros).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

async fn prefetch_all<S>(
    roots: Vec<Cid>,
    source: Arc<S>,
    batch: usize,
    swarm: bool,
) -> Result<HashMap<Cid, Vec<u8>>>
where
    S: BlockSource + 'static,
{
    let config = TraversalConfig {
        concurrency: batch.max(1),
        fetch_timeout: Duration::from_secs(30),
    };
    let mut traversal = traverse(roots, source, config, CancellationToken::new());
    let mut fetched = HashMap::new();
    while let Some(event) = traversal.events.recv().await {
        match event {
            TraversalEvent::Block { cid, data } => {
                fetched.insert(cid, data);
            }
            TraversalEvent::Failed { cid, message } => {
                if !swarm {
                    return Err(Error::NotFound(cid));
                }
                return Err(Error::Other(format!(
                    "export failed, could not fetch {cid}: {message}"
                )));
            }
        }
    }
    Ok(fetched)
}

fn preorder_cids(roots: &[Cid], fetched: &HashMap<Cid, Vec<u8>>) -> Vec<Cid> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack: VecDeque<Cid> = roots.iter().copied().collect();

    while let Some(cid) = stack.pop_front() {
        if !visited.insert(cid) {
            continue;
        }
        order.push(cid);
        if let Some(data) = fetched.get(&cid) {
            if let Ok(dagkit_cid::Node::Branch { links, .. }) = dagkit_cid::decode(data) {
                for link in links.into_iter().rev() {
                    stack.push_front(link.cid);
                }
            }
        }
    }
    order
}

fn varint_len(mut v: usize) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagkit_blockstore::{LocalBlockSource, MemoryBlockStore};
    use dagkit_cid::{encode_branch, encode_leaf, Link};
    use std::io::Cursor;

    fn build_small_dag(store: &MemoryBlockStore) -> Cid {
        let (leaf_cid, leaf_bytes) = encode_leaf(b"hello".to_vec()).unwrap();
        store.put(leaf_cid, leaf_bytes.clone()).unwrap();
        let link = Link {
            cid: leaf_cid,
            block_size: leaf_bytes.len() as u64,
            file_size: 5,
        };
        let (root_cid, root_bytes) = encode_branch(&[link]).unwrap();
        store.put(root_cid, root_bytes).unwrap();
        root_cid
    }

    #[tokio::test]
    async fn roundtrips_through_write_and_import() {
        let store = MemoryBlockStore::new();
        let root = build_small_dag(&store);
        let source = Arc::new(LocalBlockSource::new(Arc::new(store)));

        let mut buf = Vec::new();
        write_car(&mut buf, vec![root], source, 4, false, true)
            .await
            .unwrap();

        let dest = MemoryBlockStore::new();
        let roots = import_into(Cursor::new(buf), &dest).await.unwrap();
        assert_eq!(roots, vec![root]);
        assert!(dest.has(&root).unwrap());
    }

    #[tokio::test]
    async fn padded_output_reaches_pad_target() {
        let store = MemoryBlockStore::new();
        let root = build_small_dag(&store);
        let source = Arc::new(LocalBlockSource::new(Arc::new(store)));

        let mut buf = Vec::new();
        write_car(&mut buf, vec![root], source, 4, true, true)
            .await
            .unwrap();
        assert_eq!(buf.len() as u64, pad(buf.len() as u64));
    }

    #[tokio::test]
    async fn offline_export_of_a_locally_absent_root_reports_not_found() {
        let store = MemoryBlockStore::new();
        let missing = dagkit_cid::cid_for(b"never stored");
        let source = Arc::new(LocalBlockSource::new(Arc::new(store)));

        let mut buf = Vec::new();
        let err = write_car(&mut buf, vec![missing], source, 4, false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(cid) if cid == missing));
    }

    #[test]
    fn header_roundtrips_through_cbor() {
        let cid = dagkit_cid::cid_for(b"test");
        let header = CarHeader::new(vec![cid]);
        let bytes = header.to_bytes().unwrap();
        assert_eq!(CarHeader::from_bytes(&bytes).unwrap(), header);
    }
}
