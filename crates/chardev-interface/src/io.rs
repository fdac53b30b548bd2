use crate::{Error, Result};

/// Caller memory a driver copies data into (the destination of `read`).
pub trait IoBufferWriter {
    /// Number of bytes the caller asked for that are not written yet.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `data`. On failure nothing is reported as written.
    fn write_slice(&mut self, data: &[u8]) -> Result;
}

/// Caller memory a driver copies data out of (the source of `write`).
pub trait IoBufferReader {
    /// Number of bytes the caller offered that are not read yet.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fills `data` completely from the front of the buffer.
    fn read_slice(&mut self, data: &mut [u8]) -> Result;
}

/// A user buffer whose declared length may be larger than the memory that
/// backs it, the way a bad pointer/length pair from user space would be.
/// Copies that run past the backing memory fail with [`Error::FaultyBuffer`].
pub struct UserSliceWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    pos: usize,
}

impl<'a> UserSliceWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        let len = buf.len();
        Self { buf, len, pos: 0 }
    }

    pub fn with_len(buf: &'a mut [u8], len: usize) -> Self {
        Self { buf, len, pos: 0 }
    }

    /// Bytes copied so far.
    pub fn written(&self) -> usize {
        self.pos
    }
}

impl IoBufferWriter for UserSliceWriter<'_> {
    fn len(&self) -> usize {
        self.len - self.pos
    }

    fn write_slice(&mut self, data: &[u8]) -> Result {
        let end = self.pos + data.len();
        if end > self.len || end > self.buf.len() {
            return Err(Error::FaultyBuffer);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }
}

pub struct UserSliceReader<'a> {
    buf: &'a [u8],
    len: usize,
    pos: usize,
}

impl<'a> UserSliceReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            len: buf.len(),
            pos: 0,
        }
    }

    pub fn with_len(buf: &'a [u8], len: usize) -> Self {
        Self { buf, len, pos: 0 }
    }
}

impl IoBufferReader for UserSliceReader<'_> {
    fn len(&self) -> usize {
        self.len - self.pos
    }

    fn read_slice(&mut self, data: &mut [u8]) -> Result {
        let end = self.pos + data.len();
        if end > self.len || end > self.buf.len() {
            return Err(Error::FaultyBuffer);
        }
        data.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_writer_faults_past_backing_memory() {
        let mut mem = [0u8; 4];
        let mut w = UserSliceWriter::with_len(&mut mem, 8);
        assert_eq!(w.len(), 8);
        w.write_slice(b"ab").unwrap();
        assert_eq!(w.write_slice(b"cdef"), Err(Error::FaultyBuffer));
        assert_eq!(w.written(), 2);
        assert_eq!(&mem[..2], b"ab");
    }

    #[test]
    fn test_reader_consumes_front() {
        let mut r = UserSliceReader::new(b"hello");
        let mut head = [0u8; 3];
        r.read_slice(&mut head).unwrap();
        assert_eq!(&head, b"hel");
        assert_eq!(r.len(), 2);

        let mut rest = [0u8; 3];
        assert_eq!(r.read_slice(&mut rest), Err(Error::FaultyBuffer));
        assert_eq!(r.len(), 2);
    }
}
