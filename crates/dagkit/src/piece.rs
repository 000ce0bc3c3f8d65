use std::path::{Path, PathBuf};

/// Compute the nested filestore path for `piece_cid` under `root`: the last
/// 12 characters of the CID's textual form are split into three 4-character
/// segments, nested outermost-to-innermost starting from that tail, with
/// the full CID string as the filename (`spec.md` §6).
pub fn piece_path(root: &Path, piece_cid: &str) -> PathBuf {
    let tail_start = piece_cid.len().saturating_sub(12);
    let tail = &piece_cid[tail_start..];
    let mut path = root.to_path_buf();
    for segment in tail.as_bytes().chunks(4) {
        path.push(std::str::from_utf8(segment).expect("cid text is ascii/utf8"));
    }
    path.push(piece_cid);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nests_three_four_character_segments() {
        let cid = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
        let path = piece_path(Path::new("/root"), cid);
        let tail = &cid[cid.len() - 12..];
        let expected = Path::new("/root")
            .join(&tail[0..4])
            .join(&tail[4..8])
            .join(&tail[8..12])
            .join(cid);
        assert_eq!(path, expected);
    }

    #[test]
    fn short_cid_does_not_panic() {
        let path = piece_path(Path::new("/root"), "ab");
        assert_eq!(path, Path::new("/root").join("ab").join("ab"));
    }
}
