//! Content identifiers and the dag-pb block codec shared by every other
//! `dagkit` crate.

mod error;
mod node;
mod pb;

pub use cid::Cid;
pub use error::{Error, Result};
pub use node::{
    cid_for, decode, encode_branch, encode_leaf, verify_cid, Link, Node, DAG_PB_CODEC,
    MAX_LINKS_PER_BRANCH,
};
pub use pb::{FsData, FsKind, PbLink, PbNode};

/// Codec for a raw, unwrapped byte block (not used by this engine's own
/// node encoding, but recognized on read so foreign raw-leaf blocks don't
/// fail to resolve).
pub const RAW_CODEC: u64 = 0x55;

/// An encoded block: its CID and its exact on-disk/wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub cid: Cid,
    pub data: Vec<u8>,
}

impl Block {
    pub fn new(cid: Cid, data: Vec<u8>) -> Self {
        Block { cid, data }
    }

    /// Wrap raw bytes into a block under [`RAW_CODEC`], hashing to mint the CID.
    pub fn from_raw(data: Vec<u8>) -> Self {
        use multihash_codetable::MultihashDigest;
        let digest = multihash_codetable::Code::Sha2_256.digest(&data);
        let cid = Cid::new_v1(RAW_CODEC, digest);
        Block { cid, data }
    }
}
