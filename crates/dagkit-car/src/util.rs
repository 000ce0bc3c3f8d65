use dagkit_cid::Cid;
use integer_encoding::{VarIntAsyncReader, VarIntAsyncWriter};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;

/// Read one length-delimited frame: a uvarint length prefix followed by
/// that many bytes. Returns `None` at a clean end of stream.
pub(crate) async fn ld_read<R>(reader: &mut R) -> Result<Option<Vec<u8>>, Error>
where
    R: AsyncRead + Unpin,
{
    let len: usize = match VarIntAsyncReader::read_varint_async(reader).await {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    let mut buf = Vec::with_capacity(len);
    reader.take(len as u64).read_to_end(&mut buf).await?;
    if buf.len() != len {
        return Err(Error::Parsing("truncated frame".to_string()));
    }
    Ok(Some(buf))
}

/// Write one length-delimited frame: `varint(bytes.len()) ∥ bytes`.
pub(crate) async fn ld_write<W>(writer: &mut W, bytes: &[u8]) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_varint_async(bytes.len()).await?;
    writer.write_all(bytes).await?;
    Ok(())
}

/// Read one `varint(len(cidBytes)+len(blockBytes)) ∥ cidBytes ∥ blockBytes`
/// node, split it into its CID and block bytes, and verify the block bytes
/// actually hash to the claimed CID before handing it back.
pub(crate) async fn read_node<R>(reader: &mut R) -> Result<Option<(Cid, Vec<u8>)>, Error>
where
    R: AsyncRead + Unpin,
{
    match ld_read(reader).await? {
        Some(buf) => {
            let mut cursor = std::io::Cursor::new(&buf);
            let cid = Cid::read_bytes(&mut cursor)?;
            let pos = cursor.position() as usize;
            let data = buf[pos..].to_vec();
            if !dagkit_cid::verify_cid(&cid, &data) {
                return Err(Error::CarCorrupt(cid));
            }
            Ok(Some((cid, data)))
        }
        None => Ok(None),
    }
}
