#![no_std]
extern crate alloc;

use core::mem;

pub use crate::entry::{Entry, EntryKind};
pub use crate::error::{Error, NumericField};
pub use crate::header::{Field, Header};
pub use crate::mode::Mode;

mod entry;
mod error;
pub mod header;
mod mode;
pub mod numeric;
pub mod path;

#[cfg(test)]
mod test;

/// Every header and every content record is made of blocks of this size
pub const BLOCK_SIZE: usize = 512;
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Number of all-zero blocks terminating an archive
pub const STOP_BLOCKS: usize = 2;

/// Number of blocks needed to hold `size` bytes of content
pub fn content_blocks(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64)
}

/// Number of bytes `size` bytes of content occupy in the stream, padding
/// included. Only valid for sizes a [`Header`] encodes or decodes.
pub fn padded_size(size: u64) -> u64 {
    content_blocks(size) * BLOCK_SIZE as u64
}

/// Like [`padded_size`], `None` when the padded length doesn't fit a `u64`
pub fn checked_padded_size(size: u64) -> Option<u64> {
    content_blocks(size).checked_mul(BLOCK_SIZE as u64)
}
