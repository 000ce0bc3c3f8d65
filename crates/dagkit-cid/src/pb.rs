//! Hand-written dag-pb and unixfs wire messages.
//!
//! These are written directly against `quick_protobuf`'s `MessageRead`/
//! `MessageWrite` traits rather than generated from a `.proto` file at build
//! time, the same way the unixfs crates in this lineage hand-implement their
//! flat node types instead of running `pb-rs` for a two-message schema.

use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Result as PbResult, Writer, WriterBackend};

fn varint_len(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

fn len_prefixed_size(len: usize) -> usize {
    varint_len(len as u64) + len
}

/// `PBLink` as defined by the dag-pb spec: `{ Hash = 1, Name = 2, Tsize = 3 }`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PbLink {
    pub hash: Vec<u8>,
    pub name: Option<String>,
    pub tsize: Option<u64>,
}

impl MessageWrite for PbLink {
    fn get_size(&self) -> usize {
        let mut size = 1 + len_prefixed_size(self.hash.len());
        if let Some(name) = &self.name {
            size += 1 + len_prefixed_size(name.len());
        }
        if let Some(tsize) = self.tsize {
            size += 1 + varint_len(tsize);
        }
        size
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        w.write_with_tag(10, |w| w.write_bytes(&self.hash))?;
        if let Some(name) = &self.name {
            w.write_with_tag(18, |w| w.write_string(name))?;
        }
        if let Some(tsize) = self.tsize {
            w.write_with_tag(24, |w| w.write_uint64(tsize))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for PbLink {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = PbLink::default();
        while !r.is_eof() {
            match r.next_tag(bytes)? {
                10 => msg.hash = r.read_bytes(bytes)?.to_vec(),
                18 => msg.name = Some(r.read_string(bytes)?.to_string()),
                24 => msg.tsize = Some(r.read_uint64(bytes)?),
                t => {
                    r.read_unknown(bytes, t)?;
                }
            }
        }
        Ok(msg)
    }
}

/// `PBNode` as defined by the dag-pb spec: `{ Data = 1, Links = 2 }`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PbNode {
    pub data: Option<Vec<u8>>,
    pub links: Vec<PbLink>,
}

impl MessageWrite for PbNode {
    fn get_size(&self) -> usize {
        let data_size = self
            .data
            .as_ref()
            .map_or(0, |d| 1 + len_prefixed_size(d.len()));
        let links_size: usize = self
            .links
            .iter()
            .map(|l| 1 + len_prefixed_size(l.get_size()))
            .sum();
        data_size + links_size
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        // Links precede Data on the wire to match the canonical dag-pb
        // encoder, which always emits field 2 before field 1 for this
        // message (Data is appended last so leaf bytes trail the header).
        for link in &self.links {
            w.write_with_tag(18, |w| w.write_message(link))?;
        }
        if let Some(data) = &self.data {
            w.write_with_tag(10, |w| w.write_bytes(data))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for PbNode {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = PbNode::default();
        while !r.is_eof() {
            match r.next_tag(bytes)? {
                10 => msg.data = Some(r.read_bytes(bytes)?.to_vec()),
                18 => msg.links.push(r.read_message::<PbLink>(bytes)?),
                t => {
                    r.read_unknown(bytes, t)?;
                }
            }
        }
        Ok(msg)
    }
}

/// unixfs `Data` type tag, trimmed to the two kinds this engine produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsKind {
    Raw,
    File,
}

impl FsKind {
    fn as_u64(self) -> u64 {
        match self {
            FsKind::Raw => 0,
            FsKind::File => 2,
        }
    }

    fn from_u64(v: u64) -> Option<Self> {
        match v {
            0 => Some(FsKind::Raw),
            2 => Some(FsKind::File),
            _ => None,
        }
    }
}

/// unixfs `Data` message, trimmed to the fields a leaf/branch file node uses:
/// `{ Type = 1, Data = 2, filesize = 3, blocksizes = 4 }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsData {
    pub kind: Option<u64>,
    pub data: Option<Vec<u8>>,
    pub filesize: Option<u64>,
    pub blocksizes: Vec<u64>,
}

impl FsData {
    pub fn leaf(bytes: Vec<u8>) -> Self {
        let filesize = bytes.len() as u64;
        FsData {
            kind: Some(FsKind::Raw.as_u64()),
            data: Some(bytes),
            filesize: Some(filesize),
            blocksizes: Vec::new(),
        }
    }

    pub fn branch(filesize: u64, blocksizes: Vec<u64>) -> Self {
        FsData {
            kind: Some(FsKind::File.as_u64()),
            data: None,
            filesize: Some(filesize),
            blocksizes,
        }
    }

    pub fn kind(&self) -> Option<FsKind> {
        self.kind.and_then(FsKind::from_u64)
    }
}

impl MessageWrite for FsData {
    fn get_size(&self) -> usize {
        let mut size = self.kind.map_or(0, |_| 1 + varint_len(self.kind.unwrap()));
        if let Some(data) = &self.data {
            size += 1 + len_prefixed_size(data.len());
        }
        if let Some(filesize) = self.filesize {
            size += 1 + varint_len(filesize);
        }
        size += self
            .blocksizes
            .iter()
            .map(|v| 1 + varint_len(*v))
            .sum::<usize>();
        size
    }

    fn write_message<W: WriterBackend>(&self, w: &mut Writer<W>) -> PbResult<()> {
        if let Some(kind) = self.kind {
            w.write_with_tag(8, |w| w.write_uint64(kind))?;
        }
        if let Some(data) = &self.data {
            w.write_with_tag(18, |w| w.write_bytes(data))?;
        }
        if let Some(filesize) = self.filesize {
            w.write_with_tag(24, |w| w.write_uint64(filesize))?;
        }
        for blocksize in &self.blocksizes {
            w.write_with_tag(32, |w| w.write_uint64(*blocksize))?;
        }
        Ok(())
    }
}

impl<'a> MessageRead<'a> for FsData {
    fn from_reader(r: &mut BytesReader, bytes: &'a [u8]) -> PbResult<Self> {
        let mut msg = FsData::default();
        while !r.is_eof() {
            match r.next_tag(bytes)? {
                8 => msg.kind = Some(r.read_uint64(bytes)?),
                18 => msg.data = Some(r.read_bytes(bytes)?.to_vec()),
                24 => msg.filesize = Some(r.read_uint64(bytes)?),
                32 => msg.blocksizes.push(r.read_uint64(bytes)?),
                t => {
                    r.read_unknown(bytes, t)?;
                }
            }
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_protobuf::Writer;

    fn roundtrip_node(node: &PbNode) -> PbNode {
        let mut buf = Vec::new();
        let mut writer = Writer::new(&mut buf);
        node.write_message(&mut writer).unwrap();
        let mut reader = BytesReader::from_bytes(&buf);
        PbNode::from_reader(&mut reader, &buf).unwrap()
    }

    #[test]
    fn leaf_node_roundtrips() {
        let fsdata = FsData::leaf(b"hello world".to_vec());
        let mut fsbuf = Vec::new();
        let mut w = Writer::new(&mut fsbuf);
        fsdata.write_message(&mut w).unwrap();

        let node = PbNode {
            data: Some(fsbuf),
            links: Vec::new(),
        };
        let decoded = roundtrip_node(&node);
        assert_eq!(decoded, node);
    }

    #[test]
    fn branch_node_preserves_link_order() {
        let links = vec![
            PbLink {
                hash: vec![1, 2, 3],
                name: None,
                tsize: Some(10),
            },
            PbLink {
                hash: vec![4, 5, 6],
                name: None,
                tsize: Some(20),
            },
        ];
        let node = PbNode {
            data: None,
            links: links.clone(),
        };
        let decoded = roundtrip_node(&node);
        assert_eq!(decoded.links, links);
    }
}
