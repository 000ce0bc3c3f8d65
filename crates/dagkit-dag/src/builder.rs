//! Balanced-tree DAG construction: chunk an input, wrap each chunk in a
//! leaf block, then fold leaves (and, recursively, branches) into branch
//! nodes of at most [`MAX_LINKS_PER_BRANCH`] links until a single root
//! remains.
//!
//! Mirrors the two-phase shape of the importer this engine is modeled on:
//! first split and hash every chunk (`BalanceNode`), then greedily fan the
//! resulting link list into fixed-width branches (`buildCidByLinks`).

use dagkit_blockstore::BlockStore;
use dagkit_chunker::{BatchedChunker, FixedSizeChunker};
use dagkit_cid::{encode_branch, encode_leaf, Cid, Link, MAX_LINKS_PER_BRANCH};
use tokio::io::AsyncRead;

use crate::error::{Error, Result};

/// Chunk `reader` into `chunk_size`-byte pieces and build a balanced dag-pb
/// tree over them in `store`, returning the root CID.
pub async fn build_balanced<R, S>(reader: R, chunk_size: usize, store: &S) -> Result<Cid>
where
    R: AsyncRead + Unpin,
    S: BlockStore + ?Sized,
{
    let chunker = FixedSizeChunker::new(reader, chunk_size)?;
    let links = encode_leaves(chunker, store).await?;
    if links.is_empty() {
        return Err(Error::EmptyInput);
    }
    fold_links(links, store)
}

/// Like [`build_balanced`], but hashes and encodes each batch of leaves
/// concurrently via blocking tasks before folding them into the link list
/// in their original order.
pub async fn build_balanced_concurrent<R, S>(
    reader: R,
    chunk_size: usize,
    batch_size: usize,
    store: &S,
) -> Result<Cid>
where
    R: AsyncRead + Unpin,
    S: BlockStore + ?Sized,
{
    let chunker = FixedSizeChunker::new(reader, chunk_size)?;
    let mut batched = BatchedChunker::new(chunker, batch_size)?;
    let mut links = Vec::new();

    while let Some(batch) = batched.next_batch().await? {
        let mut tasks = Vec::with_capacity(batch.len());
        for chunk in batch {
            tasks.push(tokio::task::spawn_blocking(move || encode_leaf(chunk)));
        }
        for task in tasks {
            let (cid, bytes) = task
                .await
                .expect("leaf encoding task panicked")?;
            links.push(store_leaf(store, cid, bytes)?);
        }
    }

    if links.is_empty() {
        return Err(Error::EmptyInput);
    }
    fold_links(links, store)
}

async fn encode_leaves<R, S>(mut chunker: FixedSizeChunker<R>, store: &S) -> Result<Vec<Link>>
where
    R: AsyncRead + Unpin,
    S: BlockStore + ?Sized,
{
    let mut links = Vec::new();
    while let Some(chunk) = chunker.next_chunk().await? {
        let (cid, bytes) = encode_leaf(chunk)?;
        links.push(store_leaf(store, cid, bytes)?);
    }
    Ok(links)
}

fn store_leaf<S: BlockStore + ?Sized>(store: &S, cid: Cid, bytes: Vec<u8>) -> Result<Link> {
    let file_size = dagkit_cid::decode(&bytes)?.file_size();
    let block_size = bytes.len() as u64;
    store.put(cid, bytes)?;
    Ok(Link {
        cid,
        block_size,
        file_size,
    })
}

/// Fold a link list into a single root, fanning in at most
/// [`MAX_LINKS_PER_BRANCH`] links per branch per level until one remains.
fn fold_links<S: BlockStore + ?Sized>(mut links: Vec<Link>, store: &S) -> Result<Cid> {
    while links.len() > 1 {
        let mut next_level = Vec::with_capacity(links.len().div_ceil(MAX_LINKS_PER_BRANCH));
        for group in links.chunks(MAX_LINKS_PER_BRANCH) {
            let (cid, bytes) = encode_branch(group)?;
            let block_size = bytes.len() as u64;
            let file_size = group.iter().map(|l| l.file_size).sum();
            store.put(cid, bytes)?;
            next_level.push(Link {
                cid,
                block_size,
                file_size,
            });
        }
        links = next_level;
    }
    Ok(links[0].cid)
}
