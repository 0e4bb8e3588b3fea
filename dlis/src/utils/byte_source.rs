use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::ops::Range;
use std::path::Path;

use anyhow::Result;

use crate::utils::errors::ReadError;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Sequential, refillable read buffer over an input stream.
///
/// [`ByteSource::next`] hands out windows into an internal buffer without
/// copying when enough bytes are buffered. Otherwise the unread tail is
/// shifted to the front and the buffer is topped up from the reader. A
/// window stays valid only until the following call to `next`.
pub struct ByteSource<R: Read> {
    reader: R,
    buffer: Vec<u8>,
    pos: usize,
    filled: usize,
    /// Absolute stream offset of `buffer[0]`.
    base: u64,
    /// Bytes still to be read from `reader`, when the length is known.
    remaining: Option<u64>,
    eof: bool,
    chunk_size: usize,
}

impl ByteSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(ReadError::Io)?;
        let len = file.metadata().map_err(ReadError::Io)?.len();
        Ok(Self::new(BufReader::new(file), Some(len), chunk_size))
    }
}

impl<R: Read> ByteSource<R> {
    /// Wraps a reader. `len` is the total stream length when known; `None`
    /// reads until the reader reports end of file.
    pub fn new(reader: R, len: Option<u64>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            reader,
            buffer: Vec::with_capacity(chunk_size),
            pos: 0,
            filled: 0,
            base: 0,
            remaining: len,
            eof: len == Some(0),
            chunk_size,
        }
    }

    /// Returns the next `len` bytes.
    pub fn next(&mut self, len: usize) -> Result<&[u8]> {
        let range = self.next_range(len)?;
        Ok(&self.buffer[range])
    }

    /// Like [`ByteSource::next`], but returns the window as a range into
    /// [`ByteSource::bytes`].
    pub fn next_range(&mut self, len: usize) -> Result<Range<usize>> {
        if self.buffered() < len {
            self.refill(len)?;
            if self.buffered() < len {
                return Err(ReadError::Truncated {
                    needed: len,
                    available: self.buffered(),
                }
                .into());
            }
        }

        let start = self.pos;
        self.pos += len;
        Ok(start..self.pos)
    }

    fn refill(&mut self, len: usize) -> Result<()> {
        if self.pos > 0 {
            self.buffer.copy_within(self.pos..self.filled, 0);
            self.base += self.pos as u64;
            self.filled -= self.pos;
            self.pos = 0;
        }

        let mut want = self.chunk_size.max(len.saturating_sub(self.filled));
        if let Some(remaining) = self.remaining {
            want = want.min(remaining.min(usize::MAX as u64) as usize);
        }
        if want == 0 || self.eof {
            return Ok(());
        }

        self.buffer.resize(self.filled + want, 0);
        let mut read = 0;
        while read < want {
            match self.reader.read(&mut self.buffer[self.filled + read..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ReadError::Io(e).into()),
            }
        }

        self.filled += read;
        self.buffer.truncate(self.filled);
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= read as u64;
            if *remaining == 0 {
                self.eof = true;
            } else if self.eof {
                log::warn!("Stream ended {remaining} bytes before its declared length");
                *remaining = 0;
            }
        }

        Ok(())
    }

    pub fn bytes(&self, range: Range<usize>) -> &[u8] {
        &self.buffer[range]
    }

    /// Unread bytes currently held in the buffer.
    pub fn buffered(&self) -> usize {
        self.filled - self.pos
    }

    /// True when neither the buffer nor the underlying stream hold more bytes.
    pub fn is_drained(&mut self) -> Result<bool> {
        if self.buffered() > 0 {
            return Ok(false);
        }
        if !self.eof {
            self.refill(1)?;
        }
        Ok(self.buffered() == 0)
    }

    /// Absolute stream offset of the read cursor.
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    /// Absolute stream offset of a buffer index returned by `next_range`.
    pub fn offset_of(&self, index: usize) -> u64 {
        self.base + index as u64
    }
}
