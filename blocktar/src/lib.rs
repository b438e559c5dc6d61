mod bin;
mod builder;
pub mod ext;
mod list;
mod reader;
mod transaction;

pub use bin::*;
pub use builder::*;
pub use list::*;
pub use reader::*;
pub use transaction::*;

pub use blocktar_core::{Entry, EntryKind, Mode};

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

const READ_WRITE_BUF_SIZE: usize = 64 * blocktar_core::BLOCK_SIZE;

#[derive(thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] blocktar_core::Error),

    #[error("{context}{}", display_path(.path))]
    Io {
        source: io::Error,
        path: Option<PathBuf>,
        context: &'static str,
    },

    /// The header for this entry can't be written; the entry is left out
    #[error("{}: {source}", .path.display())]
    Entry {
        path: PathBuf,
        source: blocktar_core::Error,
    },

    /// A file, directory or link in the tree being archived can't be read
    #[error("Cannot read {}: {source}", .path.display())]
    Source { path: PathBuf, source: io::Error },

    #[error("{}: unsupported file type, not archived", .0.display())]
    UnsupportedType(PathBuf),

    #[error("{}: file changed size while archiving (read {actual}, expected {expected})", .entry.display())]
    LengthMismatch {
        entry: PathBuf,
        actual: u64,
        expected: u64,
    },

    #[error("Corrupt archive at offset {offset}")]
    Corrupt {
        offset: u64,
        source: blocktar_core::Error,
    },

    #[error("Malformed end of archive at offset {0}")]
    BadEndOfArchive(u64),

    #[error("Unexpected end of archive at offset {0}")]
    UnexpectedEof(u64),

    #[error("Invalid path component {} in {}", .component.display(), .entry.display())]
    InvalidPath { entry: PathBuf, component: PathBuf },

    #[error("Failed to restore timestamps. {changed} paths changed, {remaining} paths remaining")]
    FailedCommit {
        changed: usize,
        remaining: usize,
        source: io::Error,
    },
}

impl Error {
    /// Whether this error only affects a single entry of the tree being
    /// archived. Anything else aborts the whole operation.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Entry { source, .. } => source.is_recoverable(),
            Error::Source { .. } | Error::UnsupportedType(_) | Error::LengthMismatch { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}")?;

        let mut source = self.source();
        while let Some(err) = source {
            writeln!(f, "\tCaused by: {err}")?;
            source = err.source();
        }

        Ok(())
    }
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None => String::new(),
    }
}

/// Build a closure mapping an [`io::Error`] to [`Error::Io`], optionally with
/// the path it happened on.
#[macro_export]
macro_rules! wrap_io_err {
    ($path:expr, $context:expr) => {
        |source| $crate::Error::Io {
            source,
            path: Some(::std::path::PathBuf::from(&$path)),
            context: $context,
        }
    };
    ($context:expr) => {
        |source| $crate::Error::Io {
            source,
            path: None,
            context: $context,
        }
    };
}

/// Byte representation of a path, as stored in headers
pub(crate) fn path_bytes(path: &Path) -> &[u8] {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes()
}
