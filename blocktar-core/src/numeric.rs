//! Numeric header fields.
//!
//! Values are stored as zero-padded octal ASCII terminated by a NUL byte.
//! Values that don't fit that representation may use the GNU base-256
//! extension instead: the field is zero filled, the value is stored
//! big-endian in the trailing bytes and the high bit of the first byte is
//! set. Anything that fits a `u32` ends up in the last four bytes.

use crate::{Error, NumericField};

/// High bit of the first byte of a base-256 encoded field
pub const BASE256_MARKER: u8 = 0x80;

/// Largest value an octal field of `width` bytes can hold, leaving room for
/// the terminating NUL.
pub const fn octal_capacity(width: usize) -> u64 {
    (1u64 << (3 * (width as u32 - 1))) - 1
}

/// Largest value a base-256 field of `width` bytes can hold. The first byte
/// only carries the marker.
pub const fn base256_capacity(width: usize) -> u64 {
    let bits = 8 * (width as u32 - 1);
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Write `value` as NUL-terminated, zero-padded octal. `None` means the
/// value doesn't fit.
pub fn write_octal(field: &mut [u8], value: u64) -> Option<()> {
    let width = field.len();
    if width == 0 || value > octal_capacity(width) {
        return None;
    }

    let (digits, nul) = field.split_at_mut(width - 1);
    nul[0] = 0;
    let mut rest = value;
    for digit in digits.iter_mut().rev() {
        *digit = b'0' + (rest & 0o7) as u8;
        rest >>= 3;
    }
    Some(())
}

/// Write `value` as GNU base-256. `None` means the value doesn't fit.
pub fn write_base256(field: &mut [u8], value: u64) -> Option<()> {
    let width = field.len();
    if width < 2 || value > base256_capacity(width) {
        return None;
    }

    field.fill(0);
    let bytes = value.to_be_bytes();
    let used = (width - 1).min(bytes.len());
    field[width - used..].copy_from_slice(&bytes[bytes.len() - used..]);
    field[0] |= BASE256_MARKER;
    Some(())
}

/// Write a numeric field, falling back to base-256 when octal doesn't fit
/// and `strict` is off.
pub fn write_numeric(
    field: &mut [u8],
    value: u64,
    strict: bool,
    name: NumericField,
) -> Result<(), Error> {
    if write_octal(field, value).is_some() {
        return Ok(());
    }
    if !strict && write_base256(field, value).is_some() {
        return Ok(());
    }
    Err(Error::OutOfRange { field: name, value })
}

/// Parse an octal ASCII field. Leading spaces are skipped, the digits end at
/// the first NUL or space. An empty field is zero.
pub fn parse_octal(bytes: &[u8]) -> Result<u64, Error> {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes[start..]
        .iter()
        .position(|&b| b == b' ' || b == 0)
        .map_or(bytes.len(), |i| start + i);

    let mut value: u64 = 0;
    for &byte in &bytes[start..end] {
        if !(b'0'..=b'7').contains(&byte) {
            return Err(Error::InvalidOctal(bytes.to_vec()));
        }
        value = value
            .checked_mul(8)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or_else(|| Error::InvalidOctal(bytes.to_vec()))?;
    }
    Ok(value)
}

/// Parse a field that is either octal or base-256, checking the marker bit
/// first. A base-256 value wider than a `u64` is out of range for `name`.
pub fn parse_numeric(bytes: &[u8], name: NumericField) -> Result<u64, Error> {
    match bytes.first() {
        Some(first) if first & BASE256_MARKER != 0 => {
            let mut value: u64 = u64::from(first & !BASE256_MARKER);
            for &byte in &bytes[1..] {
                value = value
                    .checked_mul(256)
                    .and_then(|v| v.checked_add(u64::from(byte)))
                    .ok_or(Error::OutOfRange { field: name, value: u64::MAX })?;
            }
            Ok(value)
        }
        _ => parse_octal(bytes),
    }
}
