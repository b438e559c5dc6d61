use alloc::format;
use alloc::vec::Vec;
use core::error;
use core::fmt::{self, Display, Formatter};

use bytemuck::PodCastError;

/// Numeric header fields, used to name the field an error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericField {
    Mode,
    Uid,
    Gid,
    Size,
    Mtime,
    Checksum,
}

impl Display for NumericField {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            NumericField::Mode => "mode",
            NumericField::Uid => "uid",
            NumericField::Gid => "gid",
            NumericField::Size => "size",
            NumericField::Mtime => "mtime",
            NumericField::Checksum => "checksum",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq)]
pub enum Error {
    Cast(PodCastError),
    InvalidChecksum { stored: u64, computed: u64 },
    InvalidMagic([u8; 6]),
    InvalidVersion([u8; 2]),
    InvalidOctal(Vec<u8>),
    InvalidType(u8),
    NameTooLong { len: usize, max: usize },
    OutOfRange { field: NumericField, value: u64 },
    PathTooLong(usize),
}

impl Error {
    /// Errors that only concern a single entry while building an archive.
    /// Everything else means the stream itself can't be trusted.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NameTooLong { .. } | Error::OutOfRange { .. } | Error::PathTooLong(_)
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        use Error::*;

        let msg = match self {
            Cast(err) => format!("Cast: {}", err),
            InvalidChecksum { stored, computed } => format!(
                "Invalid checksum: header says {:o}, computed {:o}",
                stored, computed
            ),
            InvalidMagic(magic) => format!("Invalid magic: {:?}", magic),
            InvalidVersion(version) => format!("Invalid version: {:?}", version),
            InvalidOctal(bytes) => format!("Invalid octal field: {:?}", bytes),
            InvalidType(flag) => format!("Invalid type flag: {:?}", *flag as char),
            NameTooLong { len, max } => format!("Name too long: {} > {}", len, max),
            OutOfRange { field, value } => {
                format!("{} out of range: {}", field, value)
            }
            PathTooLong(len) => format!("Path too long: {} bytes", len),
        };
        f.write_str(&msg)
    }
}

impl error::Error for Error {}

impl From<PodCastError> for Error {
    fn from(err: PodCastError) -> Error {
        Error::Cast(err)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::{Error, NumericField};

    #[test]
    fn recoverable_split() {
        assert!(Error::PathTooLong(300).is_recoverable());
        assert!(Error::OutOfRange { field: NumericField::Uid, value: 1 << 22 }.is_recoverable());
        assert!(!Error::InvalidChecksum { stored: 1, computed: 2 }.is_recoverable());
        assert!(!Error::InvalidType(b'7').is_recoverable());
    }

    #[test]
    fn display() {
        let err = Error::OutOfRange { field: NumericField::Mtime, value: 42 };
        assert_eq!(err.to_string(), "mtime out of range: 42");
        assert_eq!(Error::InvalidType(b'x').to_string(), "Invalid type flag: 'x'");
    }
}
