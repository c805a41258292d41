//! Micro-frame framing for LZX chunks inside XCompress blocks.
//!
//! Every compressed frame is preceded by a 16-bit big-endian length. When the
//! high byte of that length is `0xFF` the field is an escape: one further
//! byte is skipped and a second 16-bit big-endian length follows, which is
//! the real compressed length. Writers use the escape to carry the output
//! size of a short frame (`FF`, uncompressed size, compressed size), and
//! must use it whenever a plain length would itself start with `0xFF`.
//!
//! A length of zero, or a frame that runs past the end of the input, ends
//! the stream.

use crate::constants::FRAME_SIZE;
use hecomp_core::error::{HecompError, Result};

/// High byte marking an escaped length field.
pub const ESCAPE_MARKER: u8 = 0xFF;

/// Reader yielding one micro-frame payload per call.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> FrameReader<'a> {
    /// Create a reader over a framed block.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    fn read_u16(&mut self) -> Option<u16> {
        let bytes = self.data.get(self.position..self.position + 2)?;
        self.position += 2;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Next frame payload, or `None` at end of stream or on truncation.
    pub fn next_frame(&mut self) -> Option<&'a [u8]> {
        let mut size = self.read_u16()?;
        if size >> 8 == ESCAPE_MARKER as u16 {
            self.position += 1;
            size = self.read_u16()?;
        }

        let size = size as usize;
        if size == 0 || self.position + size > self.data.len() {
            return None;
        }

        let payload = &self.data[self.position..self.position + size];
        self.position += size;
        Some(payload)
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame()
    }
}

/// Append a micro-frame length field.
///
/// The escaped form is written when the frame is short (output size other
/// than [`FRAME_SIZE`]) or when the plain length would begin with the
/// escape marker.
pub fn write_frame_header(
    out: &mut Vec<u8>,
    compressed_len: usize,
    uncompressed_len: usize,
) -> Result<()> {
    let compressed = u16::try_from(compressed_len).map_err(|_| {
        HecompError::corrupted(0, format!("Frame of {} bytes cannot be framed", compressed_len))
    })?;
    if compressed == 0 {
        return Err(HecompError::corrupted(0, "Empty frame cannot be framed"));
    }

    if uncompressed_len != FRAME_SIZE || compressed >> 8 == ESCAPE_MARKER as u16 {
        let uncompressed = u16::try_from(uncompressed_len).map_err(|_| {
            HecompError::corrupted(
                0,
                format!("Frame output of {} bytes cannot be framed", uncompressed_len),
            )
        })?;
        out.push(ESCAPE_MARKER);
        out.extend_from_slice(&uncompressed.to_be_bytes());
    }
    out.extend_from_slice(&compressed.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_frames() {
        let data = [0x00, 0x02, 0xAA, 0xBB, 0x00, 0x01, 0xCC, 0x00, 0x00];
        let mut reader = FrameReader::new(&data);
        assert_eq!(reader.next_frame(), Some(&[0xAA, 0xBB][..]));
        assert_eq!(reader.next_frame(), Some(&[0xCC][..]));
        assert_eq!(reader.next_frame(), None);
    }

    #[test]
    fn test_escape_takes_three_field_path() {
        // FF 12 | 34 skipped | 00 03 | payload
        let data = [0xFF, 0x12, 0x34, 0x00, 0x03, 1, 2, 3];
        let mut reader = FrameReader::new(&data);
        assert_eq!(reader.next_frame(), Some(&[1, 2, 3][..]));
        assert_eq!(reader.position(), data.len());
    }

    #[test]
    fn test_escape_marker_never_read_as_length() {
        // 0xFF02 as a plain length would ask for 65282 bytes; the escape path
        // reads the widened length instead
        let data = [0xFF, 0x02, 0x00, 0x00, 0x01, 9];
        let mut reader = FrameReader::new(&data);
        assert_eq!(reader.next_frame(), Some(&[9][..]));
    }

    #[test]
    fn test_widened_length_past_end_fails() {
        let data = [0xFF, 0x00, 0x10, 0x00, 0x09, 1, 2];
        let mut reader = FrameReader::new(&data);
        assert_eq!(reader.next_frame(), None);
    }

    #[test]
    fn test_truncated_length_field() {
        let data = [0x00];
        assert_eq!(FrameReader::new(&data).next_frame(), None);
        let data = [0xFF, 0x00, 0x10, 0x00];
        assert_eq!(FrameReader::new(&data).next_frame(), None);
    }

    #[test]
    fn test_write_header_forms() {
        let mut out = Vec::new();
        write_frame_header(&mut out, 0x1234, FRAME_SIZE).unwrap();
        assert_eq!(out, vec![0x12, 0x34]);

        let mut out = Vec::new();
        write_frame_header(&mut out, 0x0010, 3).unwrap();
        assert_eq!(out, vec![0xFF, 0x00, 0x03, 0x00, 0x10]);

        let mut out = Vec::new();
        write_frame_header(&mut out, 0xFF10, FRAME_SIZE).unwrap();
        assert_eq!(out, vec![0xFF, 0x80, 0x00, 0xFF, 0x10]);

        assert!(write_frame_header(&mut Vec::new(), 0, FRAME_SIZE).is_err());
        assert!(write_frame_header(&mut Vec::new(), 70000, FRAME_SIZE).is_err());
    }

    #[test]
    fn test_written_frames_read_back() {
        let mut out = Vec::new();
        for (payload, raw) in [(&[1u8, 2, 3][..], FRAME_SIZE), (&[4u8][..], 10)] {
            write_frame_header(&mut out, payload.len(), raw).unwrap();
            out.extend_from_slice(payload);
        }
        out.extend_from_slice(&[0; 5]);

        let frames: Vec<&[u8]> = FrameReader::new(&out).collect();
        assert_eq!(frames, vec![&[1u8, 2, 3][..], &[4u8][..]]);
    }
}
