use std::io::{self, Read, Write};

use blocktar_core::{Entry, EntryKind, Header, BLOCK_SIZE};
use log::{trace, warn};

use crate::{wrap_io_err, Error, READ_WRITE_BUF_SIZE};

/// An entry as found in the stream, with the location of its content
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub entry: Entry,
    /// Stream offset of the first content byte
    pub offset: u64,
}

impl ArchiveEntry {
    /// Content length in bytes, without padding
    pub fn len(&self) -> u64 {
        self.entry.size
    }

    pub fn is_empty(&self) -> bool {
        self.entry.size == 0
    }
}

/// Sequential, single pass scanner over an archive stream.
///
/// After [`next_entry`](Self::next_entry) returns an entry, its content can
/// be consumed with [`read_content`](Self::read_content) or passed over with
/// [`skip_content`](Self::skip_content). Content left untouched is skipped
/// by the next call to `next_entry`.
pub struct ArchiveReader<R> {
    src: R,
    strict: bool,
    /// Bytes consumed from `src` so far
    pos: u64,
    /// Content bytes of the current entry not consumed yet
    content_left: u64,
    /// Padding bytes following the current entry's content
    padding_left: u64,
    done: bool,
    block: [u8; BLOCK_SIZE],
}

impl<R: Read> ArchiveReader<R> {
    /// `strict` requires exact magic and version in every header
    pub fn new(src: R, strict: bool) -> ArchiveReader<R> {
        ArchiveReader {
            src,
            strict,
            pos: 0,
            content_left: 0,
            padding_left: 0,
            done: false,
            block: [0; BLOCK_SIZE],
        }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Decode the next header. `Ok(None)` at the end of the archive; once
    /// that or an error is returned, no more entries are produced.
    pub fn next_entry(&mut self) -> Result<Option<ArchiveEntry>, Error> {
        if self.done {
            return Ok(None);
        }
        let next = self.scan();
        if !matches!(next, Ok(Some(_))) {
            self.done = true;
        }
        next
    }

    fn scan(&mut self) -> Result<Option<ArchiveEntry>, Error> {
        self.skip_content()?;

        let offset = self.pos;
        if !self.read_block()? {
            warn!("archive ends at offset {} without stop blocks", offset);
            return Ok(None);
        }

        let header = Header::from_bytes(&self.block)?;
        if header.is_zero() {
            return self.check_end(offset).map(|()| None);
        }

        let entry = header
            .decode(self.strict)
            .map_err(|source| Error::Corrupt { offset, source })?;
        trace!("{} at offset {}", entry, offset);

        if entry.kind == EntryKind::File {
            self.content_left = entry.size;
            self.padding_left = entry.padded_size() - entry.size;
        }
        Ok(Some(ArchiveEntry {
            entry,
            offset: self.pos,
        }))
    }

    /// A zero block was read at `offset`, the next one has to be zero as well.
    /// Running out of input in between is not a proper end either.
    fn check_end(&mut self, offset: u64) -> Result<(), Error> {
        if !self.read_block()? {
            warn!("archive ends at offset {} after a single stop block", self.pos);
            return Err(Error::BadEndOfArchive(offset));
        }
        let header = Header::from_bytes(&self.block)?;
        if !header.is_zero() {
            return Err(Error::BadEndOfArchive(offset));
        }
        trace!("end of archive at offset {}", offset);
        Ok(())
    }

    /// Copy the rest of the current entry's content to `dst`, then move past
    /// its padding. Returns the number of content bytes copied.
    pub fn read_content<W: Write>(&mut self, mut dst: W) -> Result<u64, Error> {
        let mut buf = vec![0; READ_WRITE_BUF_SIZE.min(self.content_left as usize)];
        let mut total = 0;
        while self.content_left > 0 {
            let want = buf.len().min(self.content_left as usize);
            let count = self.read_some(&mut buf[..want])?;
            dst.write_all(&buf[..count])
                .map_err(wrap_io_err!("Writing entry content"))?;
            self.content_left -= count as u64;
            total += count as u64;
        }
        self.discard(self.padding_left)?;
        self.padding_left = 0;
        Ok(total)
    }

    /// Pass over whatever is left of the current entry's content and padding
    pub fn skip_content(&mut self) -> Result<(), Error> {
        let left = self.content_left + self.padding_left;
        self.discard(left)?;
        self.content_left = 0;
        self.padding_left = 0;
        Ok(())
    }

    fn discard(&mut self, len: u64) -> Result<(), Error> {
        if len == 0 {
            return Ok(());
        }
        let copied = io::copy(&mut (&mut self.src).take(len), &mut io::sink())
            .map_err(wrap_io_err!("Skipping entry content"))?;
        self.pos += copied;
        if copied != len {
            return Err(Error::UnexpectedEof(self.pos));
        }
        Ok(())
    }

    /// Read at least one byte of content into `buf`
    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        loop {
            match self.src.read(buf) {
                Ok(0) => return Err(Error::UnexpectedEof(self.pos)),
                Ok(count) => {
                    self.pos += count as u64;
                    return Ok(count);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(wrap_io_err!("Reading entry content")(err)),
            }
        }
    }

    /// Fill `self.block`. `Ok(false)` on a clean end of stream before the
    /// first byte; a partial block is an error.
    fn read_block(&mut self) -> Result<bool, Error> {
        let mut total = 0;
        while total < BLOCK_SIZE {
            match self.src.read(&mut self.block[total..]) {
                Ok(0) if total == 0 => return Ok(false),
                Ok(0) => return Err(Error::UnexpectedEof(self.pos + total as u64)),
                Ok(count) => total += count,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(wrap_io_err!("Reading header")(err)),
            }
        }
        self.pos += BLOCK_SIZE as u64;
        Ok(true)
    }
}
