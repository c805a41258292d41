//! Growable, seekable in-memory byte stream.
//!
//! `MemoryStream` stands in for a file handle wherever the codecs need
//! random access, so every transcode runs entirely off-disk. Writing past
//! the end grows the buffer (zero-filling any gap left by a seek).

use std::io::{self, Read, Seek, SeekFrom, Write};

/// An in-memory byte store supporting read, write, seek and tell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStream {
    data: Vec<u8>,
    position: usize,
}

impl MemoryStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream over existing bytes, positioned at the start.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }

    /// Current position.
    pub fn tell(&self) -> u64 {
        self.position as u64
    }

    /// Total number of bytes stored.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the stream holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the stored bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream and return the stored bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for MemoryStream {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position >= self.data.len() || buf.is_empty() {
            return Ok(0);
        }
        let count = buf.len().min(self.data.len() - self.position);
        buf[..count].copy_from_slice(&self.data[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let end = self.position + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.position..end].copy_from_slice(buf);
        self.position = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
            SeekFrom::End(delta) => self.data.len() as i128 + delta as i128,
        };
        if target < 0 || target > usize::MAX as i128 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            ));
        }
        self.position = target as usize;
        Ok(self.position as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut stream = MemoryStream::new();
        stream.write_all(b"hello").unwrap();
        assert_eq!(stream.tell(), 5);

        stream.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_read_at_end_returns_zero() {
        let mut stream = MemoryStream::from_vec(vec![1, 2]);
        stream.seek(SeekFrom::End(0)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_short_read() {
        let mut stream = MemoryStream::from_vec(vec![1, 2, 3]);
        stream.seek(SeekFrom::Start(1)).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[2, 3]);
    }

    #[test]
    fn test_overwrite_in_place() {
        let mut stream = MemoryStream::from_vec(vec![0; 8]);
        stream.seek(SeekFrom::Start(2)).unwrap();
        stream.write_all(&[0xAA, 0xBB]).unwrap();
        assert_eq!(stream.len(), 8);
        assert_eq!(stream.as_slice(), &[0, 0, 0xAA, 0xBB, 0, 0, 0, 0]);
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let mut stream = MemoryStream::new();
        stream.seek(SeekFrom::Start(3)).unwrap();
        stream.write_all(&[7]).unwrap();
        assert_eq!(stream.into_inner(), vec![0, 0, 0, 7]);
    }

    #[test]
    fn test_seek_relative() {
        let mut stream = MemoryStream::from_vec(vec![0; 10]);
        assert_eq!(stream.seek(SeekFrom::End(-4)).unwrap(), 6);
        assert_eq!(stream.seek(SeekFrom::Current(-2)).unwrap(), 4);
        assert!(stream.seek(SeekFrom::Current(-5)).is_err());
        assert_eq!(stream.tell(), 4);
    }
}
