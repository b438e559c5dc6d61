//! The decoded, logical form of a header
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Display};

use crate::header::{TYPE_DIRECTORY, TYPE_FILE, TYPE_FILE_OLD, TYPE_SYMLINK};
use crate::{Error, Mode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

impl EntryKind {
    pub fn from_flag(flag: u8) -> Result<EntryKind, Error> {
        match flag {
            TYPE_FILE | TYPE_FILE_OLD => Ok(EntryKind::File),
            TYPE_DIRECTORY => Ok(EntryKind::Directory),
            TYPE_SYMLINK => Ok(EntryKind::Symlink),
            other => Err(Error::InvalidType(other)),
        }
    }

    pub fn flag(self) -> u8 {
        match self {
            EntryKind::File => TYPE_FILE,
            EntryKind::Directory => TYPE_DIRECTORY,
            EntryKind::Symlink => TYPE_SYMLINK,
        }
    }

    /// Leading character of an `ls -l` style permission string
    pub fn type_char(self) -> char {
        match self {
            EntryKind::File => '-',
            EntryKind::Directory => 'd',
            EntryKind::Symlink => 'l',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Full path, `prefix/name` already joined
    pub path: Vec<u8>,
    pub kind: EntryKind,
    pub mode: Mode,
    pub uid: u64,
    pub gid: u64,
    /// Content length, always zero unless `kind` is `File`
    pub size: u64,
    /// Seconds since the epoch
    pub mtime: u64,
    /// Only set for symlinks
    pub link_target: Vec<u8>,
    /// Owner names, only used for display
    pub uname: Vec<u8>,
    pub gname: Vec<u8>,
}

impl Entry {
    pub fn path_bytes(&self) -> &[u8] {
        &self.path
    }

    /// Size of the content record following the header, padding included
    pub fn padded_size(&self) -> u64 {
        crate::padded_size(self.size)
    }

    /// Whether any of `prefixes` is a byte prefix of this entry's path. An
    /// empty filter list matches everything.
    pub fn matches_any<P: AsRef<[u8]>>(&self, prefixes: &[P]) -> bool {
        prefixes.is_empty()
            || prefixes
                .iter()
                .any(|prefix| self.path.starts_with(prefix.as_ref()))
    }

    /// `uname/gname` when both are known, `uid/gid` otherwise
    pub fn owner(&self) -> String {
        if !self.uname.is_empty() && !self.gname.is_empty() {
            alloc::format!(
                "{}/{}",
                String::from_utf8_lossy(&self.uname),
                String::from_utf8_lossy(&self.gname)
            )
        } else {
            alloc::format!("{}/{}", self.uid, self.gid)
        }
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path={:?} kind={:?} size={} mode={:o} mtime={}",
            String::from_utf8_lossy(&self.path),
            self.kind,
            self.size,
            self.mode.bits(),
            self.mtime,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::test::sample_entry;

    use super::*;

    #[test]
    fn flags() {
        assert_eq!(EntryKind::from_flag(b'0'), Ok(EntryKind::File));
        assert_eq!(EntryKind::from_flag(0), Ok(EntryKind::File));
        assert_eq!(EntryKind::from_flag(b'5'), Ok(EntryKind::Directory));
        assert_eq!(EntryKind::from_flag(b'2'), Ok(EntryKind::Symlink));
        assert_eq!(EntryKind::from_flag(b'1'), Err(Error::InvalidType(b'1')));
    }

    #[test]
    fn filters() {
        let entry = sample_entry(b"dir/sub/x");
        let none: [&[u8]; 0] = [];
        assert!(entry.matches_any(&none));
        assert!(entry.matches_any(&["dir/sub"]));
        assert!(entry.matches_any(&["top", "dir"]));
        assert!(!entry.matches_any(&["dir/other"]));
    }

    #[test]
    fn owner_fallback() {
        let mut entry = sample_entry(b"a");
        assert_eq!(entry.owner(), "alice/staff");
        entry.gname.clear();
        assert_eq!(entry.owner(), "1000/100");
    }
}
