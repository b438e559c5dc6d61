//! Shared fixtures for the unit tests
use alloc::vec::Vec;

use crate::{Entry, EntryKind, Header, Mode, BLOCK_SIZE};

pub const SAMPLE_CONTENTS: &[u8] = b"hello";
pub const SAMPLE_MTIME: u64 = 1_700_000_000;

/// A regular file entry with five bytes of content
pub fn sample_entry(path: &[u8]) -> Entry {
    Entry {
        path: path.to_vec(),
        kind: EntryKind::File,
        mode: Mode::from_bits_truncate(0o644),
        uid: 1000,
        gid: 100,
        size: SAMPLE_CONTENTS.len() as u64,
        mtime: SAMPLE_MTIME,
        link_target: Vec::new(),
        uname: b"alice".to_vec(),
        gname: b"staff".to_vec(),
    }
}

/// Header block, content blocks and stop blocks for one sample file
pub fn sample_archive(path: &[u8]) -> Vec<u8> {
    let header = Header::encode(&sample_entry(path), true).unwrap();

    let mut archive = Vec::new();
    archive.extend_from_slice(header.as_bytes());
    archive.extend_from_slice(SAMPLE_CONTENTS);
    archive.resize(BLOCK_SIZE * 2, 0);
    archive.resize(BLOCK_SIZE * 4, 0);
    archive
}

#[test]
fn sample_archive_layout() {
    let archive = sample_archive(b"file");
    assert_eq!(archive.len(), 4 * BLOCK_SIZE);

    let header = Header::from_bytes(&archive[..BLOCK_SIZE]).unwrap();
    let entry = header.decode(true).unwrap();
    assert_eq!(entry.padded_size(), BLOCK_SIZE as u64);
    assert_eq!(&archive[BLOCK_SIZE..BLOCK_SIZE + 5], SAMPLE_CONTENTS);
    assert!(archive[2 * BLOCK_SIZE..].iter().all(|&b| b == 0));
}
