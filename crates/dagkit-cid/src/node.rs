use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Writer};

use crate::error::{Error, Result};
use crate::pb::{FsData, PbLink, PbNode};

/// Codec used for every block this crate produces: a dag-pb envelope
/// carrying a unixfs `Data` message, for both leaves and interior nodes.
pub const DAG_PB_CODEC: u64 = 0x70;

/// Maximum number of links a single branch node may hold (`spec.md` §4.D).
pub const MAX_LINKS_PER_BRANCH: usize = 1024;

/// Hash `bytes` with the multihash function this engine standardizes on
/// (sha2-256) and mint the default CID for a newly built dag-pb block: CIDv0
/// (`spec.md` §4.B), which is always implicitly dag-pb/sha2-256/base58btc.
pub fn cid_for(bytes: &[u8]) -> Cid {
    let digest = Code::Sha2_256.digest(bytes);
    Cid::new_v0(digest).expect("sha2-256 digest is always valid for CIDv0")
}

/// Recompute the CID of `bytes` under `claimed`'s own version and codec, and
/// check it matches. Used to catch a CAR frame whose body doesn't hash to
/// its declared CID (`spec.md` §4.F).
pub fn verify_cid(claimed: &Cid, bytes: &[u8]) -> bool {
    let digest = Code::Sha2_256.digest(bytes);
    let recomputed = match claimed.version() {
        cid::Version::V0 => Cid::new_v0(digest).ok(),
        cid::Version::V1 => Some(Cid::new_v1(claimed.codec(), digest)),
    };
    recomputed.as_ref() == Some(claimed)
}

/// A link from a branch node to a child block: its CID, the encoded size of
/// the child block, and the cumulative file size the child subtree covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub cid: Cid,
    pub block_size: u64,
    pub file_size: u64,
}

/// A decoded dag-pb node: either a leaf holding raw chunk bytes, or a branch
/// holding ordered links to children plus the aggregate file size they cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(Vec<u8>),
    Branch { links: Vec<Link>, file_size: u64 },
}

impl Node {
    pub fn file_size(&self) -> u64 {
        match self {
            Node::Leaf(bytes) => bytes.len() as u64,
            Node::Branch { file_size, .. } => *file_size,
        }
    }
}

/// Encode a leaf node and return `(cid, encoded_bytes)`.
pub fn encode_leaf(bytes: Vec<u8>) -> Result<(Cid, Vec<u8>)> {
    let fsdata = FsData::leaf(bytes);
    let mut fsbuf = Vec::with_capacity(fsdata.get_size());
    {
        let mut w = Writer::new(&mut fsbuf);
        fsdata.write_message(&mut w)?;
    }
    let node = PbNode {
        data: Some(fsbuf),
        links: Vec::new(),
    };
    encode_pb_node(node)
}

/// Encode a branch node over `links` and return `(cid, encoded_bytes)`.
pub fn encode_branch(links: &[Link]) -> Result<(Cid, Vec<u8>)> {
    let file_size = links.iter().map(|l| l.file_size).sum();
    let blocksizes = links.iter().map(|l| l.file_size).collect();
    let fsdata = FsData::branch(file_size, blocksizes);
    let mut fsbuf = Vec::with_capacity(fsdata.get_size());
    {
        let mut w = Writer::new(&mut fsbuf);
        fsdata.write_message(&mut w)?;
    }
    let pb_links = links
        .iter()
        .map(|l| PbLink {
            hash: l.cid.to_bytes(),
            name: None,
            tsize: Some(l.block_size),
        })
        .collect();
    let node = PbNode {
        data: Some(fsbuf),
        links: pb_links,
    };
    encode_pb_node(node)
}

fn encode_pb_node(node: PbNode) -> Result<(Cid, Vec<u8>)> {
    let mut buf = Vec::with_capacity(node.get_size());
    {
        let mut w = Writer::new(&mut buf);
        node.write_message(&mut w)?;
    }
    let cid = cid_for(&buf);
    Ok((cid, buf))
}

/// Decode a dag-pb-wrapped block into a [`Node`].
pub fn decode(bytes: &[u8]) -> Result<Node> {
    let mut reader = BytesReader::from_bytes(bytes);
    let pb_node = PbNode::from_reader(&mut reader, bytes)?;

    let fsbuf = pb_node.data.unwrap_or_default();
    let mut fs_reader = BytesReader::from_bytes(&fsbuf);
    let fsdata = FsData::from_reader(&mut fs_reader, &fsbuf)?;
    let kind = fsdata
        .kind()
        .ok_or_else(|| Error::UnknownFsKind(fsdata.kind.unwrap_or(u64::MAX)))?;

    match kind {
        crate::pb::FsKind::Raw => {
            if !pb_node.links.is_empty() {
                return Err(Error::LeafWithLinks(pb_node.links.len()));
            }
            Ok(Node::Leaf(fsdata.data.unwrap_or_default()))
        }
        crate::pb::FsKind::File => {
            if fsdata.data.is_some() {
                return Err(Error::BranchWithData);
            }
            let file_size = fsdata.filesize.unwrap_or(0);
            let links = pb_node
                .links
                .into_iter()
                .zip(fsdata.blocksizes.into_iter().chain(std::iter::repeat(0)))
                .map(|(link, child_file_size)| -> Result<Link> {
                    Ok(Link {
                        cid: Cid::try_from(link.hash.as_slice())?,
                        block_size: link.tsize.unwrap_or(0),
                        file_size: child_file_size,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Node::Branch { links, file_size })
        }
    }
}
