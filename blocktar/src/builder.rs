use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use blocktar_core::{Entry, EntryKind, Header, Mode, BLOCK_SIZE, STOP_BLOCKS};
use log::{debug, warn};
use nix::unistd::{Gid, Group, Uid, User};

use crate::ext::EntryExt;
use crate::{path_bytes, wrap_io_err, Error, READ_WRITE_BUF_SIZE};

/// Outcome of writing an archive
#[derive(Debug, Default)]
pub struct CreateReport {
    /// Number of headers written
    pub entries: usize,
    /// Recoverable problems; the affected nodes are missing or incomplete
    pub skipped: Vec<Error>,
}

/// Owner and group names by id, looked up once per id
#[derive(Default)]
struct OwnerNames {
    users: HashMap<u32, Vec<u8>>,
    groups: HashMap<u32, Vec<u8>>,
}

impl OwnerNames {
    fn user(&mut self, uid: u32) -> Vec<u8> {
        self.users
            .entry(uid)
            .or_insert_with(|| match User::from_uid(Uid::from_raw(uid)) {
                Ok(Some(user)) => user.name.into_bytes(),
                Ok(None) => Vec::new(),
                Err(err) => {
                    debug!("no user name for uid {}: {}", uid, err);
                    Vec::new()
                }
            })
            .clone()
    }

    fn group(&mut self, gid: u32) -> Vec<u8> {
        self.groups
            .entry(gid)
            .or_insert_with(|| match Group::from_gid(Gid::from_raw(gid)) {
                Ok(Some(group)) => group.name.into_bytes(),
                Ok(None) => Vec::new(),
                Err(err) => {
                    debug!("no group name for gid {}: {}", gid, err);
                    Vec::new()
                }
            })
            .clone()
    }
}

/// Writes entries to an archive stream, one header block followed by the
/// zero padded content blocks, and terminates the stream on
/// [`finish`](Self::finish).
///
/// Problems that only affect one node of the tree (a path that can't be
/// split, a source that can't be opened, ...) are logged and collected in the
/// [`CreateReport`]; only failures writing to `dst` abort.
///
/// # Example
/// ```
/// use blocktar::{ArchiveReader, ArchiveWriter, Entry, EntryKind, Mode};
///
/// let entry = Entry {
///     path: b"greeting.txt".to_vec(),
///     kind: EntryKind::File,
///     mode: Mode::from_bits_truncate(0o644),
///     uid: 0,
///     gid: 0,
///     size: 5,
///     mtime: 0,
///     link_target: Vec::new(),
///     uname: Vec::new(),
///     gname: Vec::new(),
/// };
///
/// let mut writer = ArchiveWriter::new(Vec::new(), true);
/// writer.append_entry(&entry, &b"hello"[..]).unwrap();
/// let (archive, report) = writer.finish().unwrap();
/// assert_eq!(report.entries, 1);
/// assert_eq!(archive.len(), 4 * 512);
///
/// let mut reader = ArchiveReader::new(&archive[..], true);
/// let found = reader.next_entry().unwrap().unwrap();
/// assert_eq!(found.entry, entry);
/// ```
pub struct ArchiveWriter<W: Write> {
    dst: W,
    strict: bool,
    verbose: bool,
    /// Device and inode of a file never to archive, usually the archive itself
    exclude: Option<(u64, u64)>,
    owners: OwnerNames,
    report: CreateReport,
    buf: Vec<u8>,
}

impl<W: Write> ArchiveWriter<W> {
    /// `strict` refuses the base-256 extension for oversized numeric fields
    pub fn new(dst: W, strict: bool) -> ArchiveWriter<W> {
        ArchiveWriter {
            dst,
            strict,
            verbose: false,
            exclude: None,
            owners: OwnerNames::default(),
            report: CreateReport::default(),
            buf: vec![0; READ_WRITE_BUF_SIZE],
        }
    }

    /// Print each archived path to stdout
    pub fn verbose(mut self, verbose: bool) -> ArchiveWriter<W> {
        self.verbose = verbose;
        self
    }

    /// Leave out the node with this device and inode number when walking a
    /// tree
    pub fn exclude(mut self, dev: u64, ino: u64) -> ArchiveWriter<W> {
        self.exclude = Some((dev, ino));
        self
    }

    /// Problems collected so far
    pub fn skipped(&self) -> &[Error] {
        &self.report.skipped
    }

    /// Write the header for `entry` and, for files, `entry.size` bytes read
    /// from `content`.
    pub fn append_entry(&mut self, entry: &Entry, content: impl Read) -> Result<(), Error> {
        let header = match Header::encode(entry, self.strict) {
            Ok(header) => header,
            Err(source) => {
                return self.skip(Error::Entry {
                    path: entry.path().to_path_buf(),
                    source,
                })
            }
        };

        self.dst
            .write_all(header.as_bytes())
            .map_err(wrap_io_err!("Writing header"))?;
        self.report.entries += 1;
        if self.verbose {
            println!("{}", entry.path().display());
        }

        if entry.kind == EntryKind::File {
            self.write_content(entry.path(), entry.size, content)?;
        }
        Ok(())
    }

    /// Archive the file, symlink or directory tree at `root`. Symlinks are
    /// stored as links, never followed.
    pub fn append_path(&mut self, root: impl AsRef<Path>) -> Result<(), Error> {
        let mut bytes = path_bytes(root.as_ref());
        while bytes.len() > 1 && bytes.ends_with(b"/") {
            bytes = &bytes[..bytes.len() - 1];
        }
        let root = Path::new(OsStr::from_bytes(bytes)).to_path_buf();
        self.append_node(&root)
    }

    fn append_node(&mut self, path: &Path) -> Result<(), Error> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(source) => return self.skip_source(path, source),
        };
        if self.exclude == Some((metadata.dev(), metadata.ino())) {
            debug!("{}: is the archive, not archived", path.display());
            return Ok(());
        }

        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            let target = match fs::read_link(path) {
                Ok(target) => target,
                Err(source) => return self.skip_source(path, source),
            };
            let entry = self.entry(
                path_bytes(path).to_vec(),
                EntryKind::Symlink,
                &metadata,
                path_bytes(&target).to_vec(),
            );
            self.append_entry(&entry, io::empty())
        } else if file_type.is_dir() {
            let mut stored = path_bytes(path).to_vec();
            if !stored.ends_with(b"/") {
                stored.push(b'/');
            }
            let entry = self.entry(stored, EntryKind::Directory, &metadata, Vec::new());
            self.append_entry(&entry, io::empty())?;

            let read_dir = match fs::read_dir(path) {
                Ok(read_dir) => read_dir,
                Err(source) => return self.skip_source(path, source),
            };
            self.append_children(path, read_dir.map(|child| child.map(|child| child.path())))
        } else if file_type.is_file() {
            let file = match File::open(path) {
                Ok(file) => file,
                Err(source) => return self.skip_source(path, source),
            };
            let entry = self.entry(
                path_bytes(path).to_vec(),
                EntryKind::File,
                &metadata,
                Vec::new(),
            );
            self.append_entry(&entry, file)
        } else {
            self.skip(Error::UnsupportedType(path.to_path_buf()))
        }
    }

    /// Archive each child of `dir`. A child that can't be listed is recorded
    /// and its siblings are still archived.
    fn append_children<I>(&mut self, dir: &Path, children: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = io::Result<PathBuf>>,
    {
        for child in children {
            match child {
                Ok(child) => self.append_node(&child)?,
                Err(source) => self.skip_source(dir, source)?,
            }
        }
        Ok(())
    }

    fn entry(
        &mut self,
        path: Vec<u8>,
        kind: EntryKind,
        metadata: &Metadata,
        link_target: Vec<u8>,
    ) -> Entry {
        Entry {
            path,
            kind,
            mode: Mode::from_bits_truncate(metadata.mode()),
            uid: u64::from(metadata.uid()),
            gid: u64::from(metadata.gid()),
            size: match kind {
                EntryKind::File => metadata.len(),
                EntryKind::Directory | EntryKind::Symlink => 0,
            },
            // Times before the epoch are stored as the epoch
            mtime: u64::try_from(metadata.mtime()).unwrap_or(0),
            link_target,
            uname: self.owners.user(metadata.uid()),
            gname: self.owners.group(metadata.gid()),
        }
    }

    /// Copy at most `size` bytes from `src`. A short or failing source is
    /// padded with zeros up to `size` so the stream stays well formed.
    fn write_content(&mut self, path: &Path, size: u64, mut src: impl Read) -> Result<(), Error> {
        let mut left = size;
        let mut read_err = None;
        while left > 0 {
            let want = self.buf.len().min(left as usize);
            let count = match src.read(&mut self.buf[..want]) {
                Ok(0) => break,
                Ok(count) => count,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    read_err = Some(err);
                    break;
                }
            };
            self.dst
                .write_all(&self.buf[..count])
                .map_err(wrap_io_err!("Writing entry content"))?;
            left -= count as u64;
        }

        if left > 0 {
            let err = match read_err {
                Some(source) => Error::Source {
                    path: path.to_path_buf(),
                    source,
                },
                None => Error::LengthMismatch {
                    entry: path.to_path_buf(),
                    actual: size - left,
                    expected: size,
                },
            };
            self.skip(err)?;
            self.write_zeros(left)?;
        }
        self.write_zeros(blocktar_core::padded_size(size) - size)
    }

    fn write_zeros(&mut self, len: u64) -> Result<(), Error> {
        io::copy(&mut io::repeat(0).take(len), &mut self.dst)
            .map_err(wrap_io_err!("Writing padding"))?;
        Ok(())
    }

    fn skip_source(&mut self, path: &Path, source: io::Error) -> Result<(), Error> {
        self.skip(Error::Source {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Record a recoverable error, pass anything else on
    fn skip(&mut self, err: Error) -> Result<(), Error> {
        if !err.is_recoverable() {
            return Err(err);
        }
        warn!("{}", err);
        self.report.skipped.push(err);
        Ok(())
    }

    /// Write the stop blocks and flush. Returns the destination and what was
    /// archived.
    pub fn finish(mut self) -> Result<(W, CreateReport), Error> {
        self.write_zeros((STOP_BLOCKS * BLOCK_SIZE) as u64)?;
        self.dst.flush().map_err(wrap_io_err!("Flushing archive"))?;
        Ok((self.dst, self.report))
    }
}
