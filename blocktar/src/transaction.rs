use std::collections::VecDeque;
use std::ffi::OsStr;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Read};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{symlink, DirBuilderExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use blocktar_core::{Entry, EntryKind, Mode};
use log::{debug, trace};
use nix::fcntl::OFlag;
use nix::sys::stat::{utimensat, UtimensatFlags};
use nix::sys::time::TimeSpec;

use crate::ext::EntryExt;
use crate::{wrap_io_err, ArchiveReader, Error};

#[derive(Debug)]
enum Action {
    /// Put back the archived mtime and the atime seen right after the path
    /// was created. Links are not followed.
    SetTimes {
        path: PathBuf,
        atime: TimeSpec,
        mtime: TimeSpec,
    },
    /// Put back an archived directory mode that lacks owner access
    SetPermissions { path: PathBuf, mode: Mode },
}

/// Owner access kept on directories until their children are extracted
const OWNER_ACCESS: Mode = Mode::USER_READ.union(Mode::USER_WRITE).union(Mode::USER_EXEC);

impl Action {
    fn commit(&self) -> io::Result<()> {
        match self {
            Action::SetTimes { path, atime, mtime } => {
                trace!("set times of {}", path.display());
                utimensat(None, path, atime, mtime, UtimensatFlags::NoFollowSymlink)?;
                Ok(())
            }
            Action::SetPermissions { path, mode } => {
                trace!("set mode of {} to {:o}", path.display(), mode.bits());
                fs::set_permissions(path, fs::Permissions::from_mode(mode.bits()))
            }
        }
    }
}

/// Materializes archive entries below a base directory.
///
/// Timestamps can't be applied while extracting, since creating a child
/// updates the mtime of its directory. They are queued and only applied on
/// [`commit`](Self::commit), once the archive has been consumed. Directory
/// modes without owner access are queued as well and applied last.
///
/// Nothing is created through a symlink: a path whose parent components
/// include one is refused, and files are opened without following one.
///
/// # Example
/// ```no_run
/// use std::fs::File;
///
/// use blocktar::{ArchiveReader, Transaction};
///
/// let mut reader = ArchiveReader::new(File::open("backup.tar").unwrap(), false);
/// let mut transaction = Transaction::new("restore");
/// transaction.extract(&mut reader, &["etc/"]).unwrap();
/// transaction.commit().unwrap();
/// ```
#[derive(Debug)]
pub struct Transaction {
    base_dir: PathBuf,
    verbose: bool,
    actions: VecDeque<Action>,
    /// Applied after `actions`, last extracted first
    permissions: Vec<Action>,
}

impl Transaction {
    pub fn new(base_dir: impl AsRef<Path>) -> Transaction {
        Transaction {
            base_dir: base_dir.as_ref().to_path_buf(),
            verbose: false,
            actions: VecDeque::new(),
            permissions: Vec::new(),
        }
    }

    /// Print each extracted path to stdout
    pub fn verbose(mut self, verbose: bool) -> Transaction {
        self.verbose = verbose;
        self
    }

    /// Number of timestamp and mode fixups not applied yet
    pub fn pending(&self) -> usize {
        self.actions.len() + self.permissions.len()
    }

    /// Extract every entry of `reader` whose path starts with one of
    /// `filters`, or all of them if `filters` is empty. Returns the number of
    /// extracted entries.
    pub fn extract<R, P>(
        &mut self,
        reader: &mut ArchiveReader<R>,
        filters: &[P],
    ) -> Result<usize, Error>
    where
        R: Read,
        P: AsRef<[u8]>,
    {
        let mut count = 0;
        while let Some(found) = reader.next_entry()? {
            let entry = &found.entry;
            if !entry.matches_any(filters) {
                trace!("{} filtered out", entry.path().display());
                reader.skip_content()?;
                continue;
            }

            let relative = entry.check_path()?;
            if relative.as_os_str().is_empty() {
                debug!("{}: nothing to extract", entry.path().display());
                reader.skip_content()?;
                continue;
            }
            let target = self.base_dir.join(&relative);

            self.create_parents(entry, &relative)?;

            match entry.kind {
                EntryKind::Directory => {
                    let created = DirBuilder::new()
                        .mode((entry.mode | OWNER_ACCESS).bits())
                        .create(&target);
                    tolerate_existing(created).map_err(wrap_io_err!(target, "Creating directory"))?;
                }
                EntryKind::File => {
                    let mut file = OpenOptions::new()
                        .write(true)
                        .create(true)
                        .truncate(true)
                        .mode(entry.mode.bits())
                        .custom_flags(OFlag::O_NOFOLLOW.bits())
                        .open(&target)
                        .map_err(wrap_io_err!(target, "Creating file"))?;
                    reader.read_content(&mut file)?;
                }
                EntryKind::Symlink => {
                    let link = OsStr::from_bytes(&entry.link_target);
                    tolerate_existing(symlink(link, &target))
                        .map_err(wrap_io_err!(target, "Creating symlink"))?;
                }
            }

            let metadata =
                fs::symlink_metadata(&target).map_err(wrap_io_err!(target, "Reading metadata"))?;
            if metadata.is_dir() && !entry.mode.contains(OWNER_ACCESS) {
                self.permissions.push(Action::SetPermissions {
                    path: target.clone(),
                    mode: entry.mode,
                });
            }
            self.actions.push_back(Action::SetTimes {
                path: target,
                atime: TimeSpec::new(metadata.atime() as _, metadata.atime_nsec() as _),
                mtime: TimeSpec::new(i64::try_from(entry.mtime).unwrap_or(i64::MAX) as _, 0),
            });

            if self.verbose {
                println!("{}", entry.path().display());
            }
            count += 1;
        }
        Ok(count)
    }

    /// Create the missing parent directories of `relative` one component at
    /// a time. A parent that is a symlink is refused.
    fn create_parents(&self, entry: &Entry, relative: &Path) -> Result<(), Error> {
        let parent = match relative.parent() {
            Some(parent) => parent,
            None => return Ok(()),
        };
        DirBuilder::new()
            .recursive(true)
            .mode(Mode::IMPLICIT_DIR.bits())
            .create(&self.base_dir)
            .map_err(wrap_io_err!(self.base_dir, "Creating directory"))?;

        let mut dir = self.base_dir.clone();
        for component in parent.components() {
            dir.push(component);
            match fs::symlink_metadata(&dir) {
                Ok(metadata) if metadata.file_type().is_symlink() => {
                    return Err(Error::InvalidPath {
                        entry: entry.path().to_path_buf(),
                        component: PathBuf::from(component.as_os_str()),
                    });
                }
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    let created = DirBuilder::new().mode(Mode::IMPLICIT_DIR.bits()).create(&dir);
                    tolerate_existing(created).map_err(wrap_io_err!(dir, "Creating directory"))?;
                }
                Err(err) => return Err(wrap_io_err!(dir, "Reading metadata")(err)),
            }
        }
        Ok(())
    }

    /// Apply the queued timestamps in extraction order, then the queued
    /// directory modes in reverse. A failed commit keeps the remaining
    /// actions, so it can be retried.
    pub fn commit(&mut self) -> Result<usize, Error> {
        let mut count = 0;
        while let Some(action) = self.actions.pop_front() {
            if let Err(err) = action.commit() {
                self.actions.push_front(action);
                return Err(self.failed_commit(count, err));
            }
            count += 1;
        }
        while let Some(action) = self.permissions.pop() {
            if let Err(err) = action.commit() {
                self.permissions.push(action);
                return Err(self.failed_commit(count, err));
            }
            count += 1;
        }
        Ok(count)
    }

    fn failed_commit(&self, changed: usize, source: io::Error) -> Error {
        Error::FailedCommit {
            changed,
            remaining: self.pending(),
            source,
        }
    }
}

fn tolerate_existing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}
