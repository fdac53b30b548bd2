//! One-slot payload buffer.
//!
//! `EMPTY` (length 0) accepts a deposit; `FULL` (length > 0) holds exactly
//! one payload until a reader has drained it and performed the closing
//! zero-length read.

use chardev_interface::{IoBufferReader, IoBufferWriter, Result};

#[derive(Debug)]
pub struct Mailbox {
    buffer: Box<[u8]>,
    len: usize,
}

impl Mailbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes of the pending payload.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len > 0
    }

    pub fn pending(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// A cursor that already covers the whole payload marks the closing read.
    pub fn eof_reached(&self, cursor: u64) -> bool {
        cursor > 0 && cursor == self.len as u64
    }

    /// Stores up to `capacity` bytes from `src`; the rest of `src` is
    /// dropped. Returns the stored length.
    ///
    /// Must only be called on an empty mailbox. A faulting source leaves
    /// it empty.
    pub fn deposit(&mut self, src: &mut dyn IoBufferReader) -> Result<usize> {
        debug_assert!(self.is_empty());
        let n = src.len().min(self.capacity());
        src.read_slice(&mut self.buffer[..n])?;
        self.len = n;
        Ok(n)
    }

    /// Copies the payload from `cursor` on into `dst`, as much as `dst`
    /// takes, and advances `cursor`. A cursor past the payload belongs to an
    /// older message and restarts at 0.
    pub fn drain(&self, cursor: &mut u64, dst: &mut dyn IoBufferWriter) -> Result<usize> {
        if *cursor > self.len as u64 {
            *cursor = 0;
        }
        let start = *cursor as usize;
        let n = dst.len().min(self.len - start);
        dst.write_slice(&self.buffer[start..start + n])?;
        *cursor += n as u64;
        Ok(n)
    }

    pub fn release(&mut self) {
        self.len = 0;
    }
}
