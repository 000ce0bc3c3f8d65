//! Splits byte streams into fixed-size chunks, and groups those chunks into
//! batches for the DAG builder's concurrent leaf-encoding path.

mod error;

pub use error::{Error, Result};

use tokio::io::{AsyncRead, AsyncReadExt};

/// Default chunk size, matching the 1 MiB unixfs chunker this engine is
/// modeled on.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Splits an [`AsyncRead`] into consecutive chunks of at most `chunk_size`
/// bytes. The final chunk may be shorter; a fully empty input yields zero
/// chunks rather than one zero-length chunk, leaving the empty-file
/// decision to the caller (the DAG builder surfaces it as an error).
pub struct FixedSizeChunker<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> FixedSizeChunker<R> {
    pub fn new(reader: R, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::ZeroChunkSize);
        }
        Ok(FixedSizeChunker { reader, chunk_size })
    }

    pub fn with_default_size(reader: R) -> Self {
        FixedSizeChunker {
            reader,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Read the next chunk, or `None` at end of input.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf))
    }

    /// Drain every chunk eagerly. Used by tests and by small-file callers
    /// that don't need the streaming path.
    pub async fn collect_all(mut self) -> Result<Vec<Vec<u8>>> {
        let mut chunks = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            chunks.push(chunk);
        }
        if chunks.is_empty() {
            return Err(Error::EmptyInput);
        }
        Ok(chunks)
    }
}

/// Groups chunks from a [`FixedSizeChunker`] into batches of up to
/// `batch_size` chunks each, so the DAG builder can hash and encode a
/// batch's leaves concurrently before folding them into the link list in
/// order (`spec.md` §4.C).
pub struct BatchedChunker<R> {
    chunker: FixedSizeChunker<R>,
    batch_size: usize,
}

impl<R: AsyncRead + Unpin> BatchedChunker<R> {
    pub fn new(chunker: FixedSizeChunker<R>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::ZeroChunkSize);
        }
        Ok(BatchedChunker {
            chunker,
            batch_size,
        })
    }

    /// Read the next batch, or `None` once the underlying chunker is
    /// exhausted. A trailing batch may contain fewer than `batch_size`
    /// chunks.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Vec<u8>>>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            match self.chunker.next_chunk().await? {
                Some(chunk) => batch.push(chunk),
                None => break,
            }
        }
        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }
}
