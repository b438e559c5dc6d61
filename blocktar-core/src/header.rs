//! The 512-byte on-disk header.
//!
//! The header is kept as a plain byte block, every field is addressed through
//! a [`Field`] giving its offset and width:
//!
//! | Offset | Width | Field    |
//! |--------|-------|----------|
//! | 0      | 100   | name     |
//! | 100    | 8     | mode     |
//! | 108    | 8     | uid      |
//! | 116    | 8     | gid      |
//! | 124    | 12    | size     |
//! | 136    | 12    | mtime    |
//! | 148    | 8     | checksum |
//! | 156    | 1     | typeflag |
//! | 157    | 100   | linkname |
//! | 257    | 6     | magic    |
//! | 263    | 2     | version  |
//! | 265    | 32    | uname    |
//! | 297    | 32    | gname    |
//! | 329    | 8     | devmajor |
//! | 337    | 8     | devminor |
//! | 345    | 155   | prefix   |
//! | 500    | 12    | pad      |
use core::fmt;
use core::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::numeric::{parse_numeric, parse_octal, write_numeric, write_octal};
use crate::{path, Entry, EntryKind, Error, Mode, NumericField, BLOCK_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub offset: usize,
    pub len: usize,
}

impl Field {
    pub const fn new(offset: usize, len: usize) -> Field {
        Field { offset, len }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    pub const fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

pub const NAME: Field = Field::new(0, 100);
pub const MODE: Field = Field::new(NAME.end(), 8);
pub const UID: Field = Field::new(MODE.end(), 8);
pub const GID: Field = Field::new(UID.end(), 8);
pub const SIZE: Field = Field::new(GID.end(), 12);
pub const MTIME: Field = Field::new(SIZE.end(), 12);
pub const CHECKSUM: Field = Field::new(MTIME.end(), 8);
pub const TYPEFLAG: Field = Field::new(CHECKSUM.end(), 1);
pub const LINKNAME: Field = Field::new(TYPEFLAG.end(), 100);
pub const MAGIC: Field = Field::new(LINKNAME.end(), 6);
pub const VERSION: Field = Field::new(MAGIC.end(), 2);
pub const UNAME: Field = Field::new(VERSION.end(), 32);
pub const GNAME: Field = Field::new(UNAME.end(), 32);
pub const DEVMAJOR: Field = Field::new(GNAME.end(), 8);
pub const DEVMINOR: Field = Field::new(DEVMAJOR.end(), 8);
pub const PREFIX: Field = Field::new(DEVMINOR.end(), 155);
pub const PAD: Field = Field::new(PREFIX.end(), 12);

const _: () = assert!(PAD.end() == BLOCK_SIZE);

pub const MAGIC_VALUE: &[u8; 6] = b"ustar\0";
pub const VERSION_VALUE: &[u8; 2] = b"00";
/// Bytes of the magic compared when not in strict mode
const MAGIC_LOOSE_LEN: usize = 5;

pub const TYPE_FILE: u8 = b'0';
/// Pre-POSIX archives mark regular files with a NUL type flag
pub const TYPE_FILE_OLD: u8 = 0;
pub const TYPE_SYMLINK: u8 = b'2';
pub const TYPE_DIRECTORY: u8 = b'5';

/// Longest symlink target
pub const LINK_MAX: usize = LINKNAME.len;
/// Longest owner name, leaving room for a NUL
pub const OWNER_NAME_MAX: usize = UNAME.len - 1;

/// Checksum of an all-zero block: only the checksum field contributes, as spaces
pub const ZERO_BLOCK_CHECKSUM: u64 = CHECKSUM.len as u64 * b' ' as u64;

#[derive(Clone, Copy, Pod, Zeroable)]
#[repr(transparent)]
pub struct Header([u8; BLOCK_SIZE]);

impl Header {
    /// View raw block data as a header, without any validation
    pub fn from_bytes(data: &[u8]) -> Result<&Header, Error> {
        Ok(bytemuck::try_from_bytes(data)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    pub fn field(&self, field: Field) -> &[u8] {
        &self.0[field.range()]
    }

    fn field_mut(&mut self, field: Field) -> &mut [u8] {
        &mut self.0[field.range()]
    }

    /// Text field up to its first NUL
    pub fn text(&self, field: Field) -> &[u8] {
        truncate_nul(self.field(field))
    }

    /// All-zero blocks mark the end of the archive
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn typeflag(&self) -> u8 {
        self.0[TYPEFLAG.offset]
    }

    /// Sum of all bytes, counting the checksum field as spaces
    pub fn compute_checksum(&self) -> u64 {
        self.0
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                if CHECKSUM.range().contains(&i) {
                    u64::from(b' ')
                } else {
                    u64::from(b)
                }
            })
            .sum()
    }

    pub fn verify_checksum(&self) -> Result<(), Error> {
        let stored = parse_octal(self.field(CHECKSUM))?;
        let computed = self.compute_checksum();
        if stored != computed {
            return Err(Error::InvalidChecksum { stored, computed });
        }
        Ok(())
    }

    /// Strict mode wants exactly `ustar\0` and `00`, otherwise only `ustar`
    /// has to match.
    pub fn verify_magic(&self, strict: bool) -> Result<(), Error> {
        let magic = self.field(MAGIC);
        if strict {
            if magic != MAGIC_VALUE {
                return Err(Error::InvalidMagic(field_array(magic)));
            }
            let version = self.field(VERSION);
            if version != VERSION_VALUE {
                return Err(Error::InvalidVersion(field_array(version)));
            }
        } else if magic[..MAGIC_LOOSE_LEN] != MAGIC_VALUE[..MAGIC_LOOSE_LEN] {
            return Err(Error::InvalidMagic(field_array(magic)));
        }
        Ok(())
    }

    pub fn encode(entry: &Entry, strict: bool) -> Result<Header, Error> {
        let mut header = Header::zeroed();

        let (name, prefix) = path::split(&entry.path)?;
        header.field_mut(NAME)[..name.len()].copy_from_slice(name);
        header.field_mut(PREFIX)[..prefix.len()].copy_from_slice(prefix);

        let size = match entry.kind {
            EntryKind::File => check_size(entry.size)?,
            EntryKind::Directory | EntryKind::Symlink => 0,
        };
        write_numeric(header.field_mut(MODE), u64::from(entry.mode.bits()), strict, NumericField::Mode)?;
        write_numeric(header.field_mut(UID), entry.uid, strict, NumericField::Uid)?;
        write_numeric(header.field_mut(GID), entry.gid, strict, NumericField::Gid)?;
        write_numeric(header.field_mut(SIZE), size, strict, NumericField::Size)?;
        write_numeric(header.field_mut(MTIME), entry.mtime, strict, NumericField::Mtime)?;

        header.0[TYPEFLAG.offset] = entry.kind.flag();
        if entry.kind == EntryKind::Symlink {
            let target = &entry.link_target;
            if target.len() > LINK_MAX {
                return Err(Error::NameTooLong { len: target.len(), max: LINK_MAX });
            }
            header.field_mut(LINKNAME)[..target.len()].copy_from_slice(target);
        }

        header.field_mut(MAGIC).copy_from_slice(MAGIC_VALUE);
        header.field_mut(VERSION).copy_from_slice(VERSION_VALUE);
        copy_truncated(header.field_mut(UNAME), &entry.uname);
        copy_truncated(header.field_mut(GNAME), &entry.gname);
        write_octal(header.field_mut(DEVMAJOR), 0);
        write_octal(header.field_mut(DEVMINOR), 0);

        let checksum = header.compute_checksum();
        write_numeric(header.field_mut(CHECKSUM), checksum, true, NumericField::Checksum)?;
        Ok(header)
    }

    /// Validate the checksum and magic, then decode every field
    pub fn decode(&self, strict: bool) -> Result<Entry, Error> {
        self.verify_checksum()?;
        self.verify_magic(strict)?;

        let kind = EntryKind::from_flag(self.typeflag())?;
        let size = match kind {
            EntryKind::File => check_size(parse_numeric(self.field(SIZE), NumericField::Size)?)?,
            EntryKind::Directory | EntryKind::Symlink => 0,
        };
        let link_target = match kind {
            EntryKind::Symlink => self.text(LINKNAME).to_vec(),
            EntryKind::File | EntryKind::Directory => Default::default(),
        };
        let mode = parse_numeric(self.field(MODE), NumericField::Mode)?;

        Ok(Entry {
            path: path::join(self.text(NAME), self.text(PREFIX)),
            kind,
            mode: Mode::from_bits_truncate(mode as u32),
            uid: parse_numeric(self.field(UID), NumericField::Uid)?,
            gid: parse_numeric(self.field(GID), NumericField::Gid)?,
            size,
            mtime: parse_numeric(self.field(MTIME), NumericField::Mtime)?,
            link_target,
            uname: self.text(UNAME).to_vec(),
            gname: self.text(GNAME).to_vec(),
        })
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("name", &alloc::string::String::from_utf8_lossy(self.text(NAME)))
            .field("prefix", &alloc::string::String::from_utf8_lossy(self.text(PREFIX)))
            .field("typeflag", &(self.typeflag() as char))
            .finish_non_exhaustive()
    }
}

/// Content sizes have to stay addressable once padded to whole blocks
fn check_size(size: u64) -> Result<u64, Error> {
    match crate::checked_padded_size(size) {
        Some(_) => Ok(size),
        None => Err(Error::OutOfRange { field: NumericField::Size, value: size }),
    }
}

fn truncate_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

fn copy_truncated(field: &mut [u8], value: &[u8]) {
    let len = value.len().min(field.len() - 1);
    field[..len].copy_from_slice(&value[..len]);
}

fn field_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
