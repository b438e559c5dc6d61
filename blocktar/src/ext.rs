//! Extention traits for base types defined in `blocktar-core`.
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

use blocktar_core::Entry;

use crate::Error;

pub trait EntryExt {
    fn path(&self) -> &Path;
    fn check_path(&self) -> Result<PathBuf, Error>;
}

impl EntryExt for Entry {
    fn path(&self) -> &Path {
        Path::new(OsStr::from_bytes(self.path_bytes()))
    }

    /// Iterate the components of the path and build a path relative to the
    /// extraction directory. Leading `/` and `.` components are dropped, `..`
    /// is refused.
    fn check_path(&self) -> Result<PathBuf, Error> {
        let path = EntryExt::path(self);
        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::RootDir | Component::CurDir => {}
                invalid => {
                    let bad_component: &Path = invalid.as_ref();
                    return Err(Error::InvalidPath {
                        entry: path.to_path_buf(),
                        component: bad_component.to_path_buf(),
                    });
                }
            }
        }
        Ok(relative)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use blocktar_core::{Entry, EntryKind, Mode};

    use super::EntryExt;

    fn entry(path: &str) -> Entry {
        Entry {
            path: path.as_bytes().to_vec(),
            kind: EntryKind::Directory,
            mode: Mode::from_bits_truncate(0o755),
            uid: 0,
            gid: 0,
            size: 0,
            mtime: 0,
            link_target: Vec::new(),
            uname: Vec::new(),
            gname: Vec::new(),
        }
    }

    #[test]
    fn relative_paths() {
        assert_eq!(entry("dir/sub/").check_path().unwrap(), Path::new("dir/sub"));
        assert_eq!(entry("/etc/passwd").check_path().unwrap(), Path::new("etc/passwd"));
        assert_eq!(entry("./a/./b").check_path().unwrap(), Path::new("a/b"));
        assert_eq!(entry("/").check_path().unwrap(), Path::new(""));
    }

    #[test]
    fn parent_refused() {
        assert!(entry("a/../../etc").check_path().is_err());
    }
}
