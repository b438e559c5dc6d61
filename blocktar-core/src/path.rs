//! Fitting a path into the header's `name` and `prefix` fields.

use alloc::vec::Vec;

use crate::header::{NAME, PREFIX};
use crate::Error;

pub const SEPARATOR: u8 = b'/';

/// Longest path that fits in `name` alone
pub const NAME_MAX: usize = NAME.len;

/// Longest prefix, leaving the last byte of the field for a NUL
pub const PREFIX_MAX: usize = PREFIX.len - 1;

/// Longest path that can be stored at all
pub const PATH_MAX: usize = NAME_MAX + 1 + PREFIX_MAX;

/// Split `path` into `(name, prefix)`.
///
/// A path of up to `NAME_MAX` bytes goes in `name` with an empty prefix.
/// Longer paths are split at the separator that leaves the longest name that
/// still fits, the separator itself is not stored.
pub fn split(path: &[u8]) -> Result<(&[u8], &[u8]), Error> {
    let len = path.len();
    if len <= NAME_MAX {
        return Ok((path, &[]));
    }
    if len > PATH_MAX {
        return Err(Error::PathTooLong(len));
    }

    // name = path[i + 1..] must fit, so i >= len - NAME_MAX - 1, and it must
    // not be empty, so i < len - 1
    let first = len - NAME_MAX - 1;
    let i = path[first..len - 1]
        .iter()
        .position(|&b| b == SEPARATOR)
        .map(|pos| first + pos)
        .ok_or(Error::PathTooLong(len))?;

    if i > PREFIX_MAX {
        return Err(Error::PathTooLong(len));
    }
    Ok((&path[i + 1..], &path[..i]))
}

/// Reassemble a path from its `name` and `prefix` fields
pub fn join(name: &[u8], prefix: &[u8]) -> Vec<u8> {
    let mut path = Vec::with_capacity(prefix.len() + 1 + name.len());
    if !prefix.is_empty() {
        path.extend_from_slice(prefix);
        path.push(SEPARATOR);
    }
    path.extend_from_slice(name);
    path
}
