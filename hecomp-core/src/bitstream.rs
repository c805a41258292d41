//! Bit-level I/O for the LZX bitstream.
//!
//! This module provides `BitReader` and `BitWriter` for the bit layout used
//! by LZX: the stream is a sequence of 16-bit little-endian words, and bits
//! are consumed from the most significant end of each word.
//!
//! # Bit Ordering
//!
//! Unlike DEFLATE (LSB-first bytes), LZX is MSB-first within 16-bit words.
//! A Huffman code is therefore read with its first bit in the high position,
//! which is why canonical codes can be compared numerically while decoding.
//!
//! # Example
//!
//! ```
//! use hecomp_core::bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new(Vec::new());
//! writer.write_bits(0b101, 3).unwrap();
//! writer.write_bits(0b1100, 4).unwrap();
//! let output = writer.finish().unwrap();
//! assert_eq!(output.len(), 2);
//!
//! let mut reader = BitReader::new(&output);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//! ```

use crate::error::{HecompError, Result};
use std::io::Write;

/// A bit reader over one compressed chunk.
///
/// Words are loaded lazily, one at a time, so after any read at most 15
/// bits of the current word remain unconsumed. The uncompressed-block
/// alignment rule depends on this.
#[derive(Debug)]
pub struct BitReader<'a> {
    /// Input bytes.
    data: &'a [u8],
    /// Next unread byte.
    position: usize,
    /// Bit buffer (MSB-first, right-aligned).
    buffer: u64,
    /// Number of valid bits in buffer.
    bits_in_buffer: u32,
    /// Total bits consumed (for error reporting).
    total_bits_read: u64,
}

impl<'a> BitReader<'a> {
    /// Create a new `BitReader` over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_read: 0,
        }
    }

    /// Get the current bit position (for error reporting).
    pub fn bit_position(&self) -> u64 {
        self.total_bits_read
    }

    /// Byte offset of the next unread byte.
    pub fn byte_position(&self) -> usize {
        self.position
    }

    /// Number of bytes not yet loaded into the bit buffer.
    pub fn remaining_bytes(&self) -> usize {
        self.data.len() - self.position
    }

    /// Load one 16-bit little-endian word.
    ///
    /// A lone trailing byte is treated as the low half of a word whose
    /// high half is zero.
    fn load_word(&mut self) -> Result<()> {
        let word = match self.data.len() - self.position {
            0 => return Err(HecompError::unexpected_eof(2)),
            1 => self.data[self.position] as u64,
            _ => u16::from_le_bytes([self.data[self.position], self.data[self.position + 1]]) as u64,
        };
        self.position = (self.position + 2).min(self.data.len());
        self.buffer = (self.buffer << 16) | word;
        self.bits_in_buffer += 16;
        Ok(())
    }

    /// Read up to 32 bits, first bit in the most significant position.
    #[inline]
    pub fn read_bits(&mut self, count: u32) -> Result<u32> {
        debug_assert!(count <= 32, "Cannot read more than 32 bits at once");

        if count == 0 {
            return Ok(0);
        }

        while self.bits_in_buffer < count {
            self.load_word()?;
        }

        self.bits_in_buffer -= count;
        let result = (self.buffer >> self.bits_in_buffer) as u32 & mask(count);
        self.buffer &= (1u64 << self.bits_in_buffer) - 1;
        self.total_bits_read += count as u64;

        Ok(result)
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Discard bits up to the next 16-bit boundary, discarding a whole word
    /// when already aligned (1 to 16 bits are always consumed).
    pub fn align_to_word(&mut self) -> Result<()> {
        if self.bits_in_buffer == 0 {
            self.load_word()?;
        }
        self.total_bits_read += self.bits_in_buffer as u64;
        self.buffer = 0;
        self.bits_in_buffer = 0;
        Ok(())
    }

    /// Read raw bytes. The reader must be word-aligned (no buffered bits).
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(self.bits_in_buffer, 0, "read_bytes on unaligned reader");

        let available = self.data.len() - self.position;
        if available < buf.len() {
            return Err(HecompError::unexpected_eof(buf.len() - available));
        }
        buf.copy_from_slice(&self.data[self.position..self.position + buf.len()]);
        self.position += buf.len();
        self.total_bits_read += buf.len() as u64 * 8;
        Ok(())
    }

    /// Skip one raw byte if present. The reader must be word-aligned.
    pub fn skip_byte(&mut self) {
        if self.position < self.data.len() {
            self.position += 1;
            self.total_bits_read += 8;
        }
    }
}

#[inline]
fn mask(count: u32) -> u32 {
    if count >= 32 {
        u32::MAX
    } else {
        (1u32 << count) - 1
    }
}

/// A bit writer producing 16-bit little-endian words, MSB-first.
///
/// Call `align_to_word()` at the end of every frame and `finish()` when done.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    /// Underlying writer.
    writer: W,
    /// Bit buffer (right-aligned).
    buffer: u64,
    /// Number of bits in buffer.
    bits_in_buffer: u32,
    /// Total bits written.
    total_bits_written: u64,
}

impl<W: Write> BitWriter<W> {
    /// Create a new `BitWriter` wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: 0,
            bits_in_buffer: 0,
            total_bits_written: 0,
        }
    }

    /// Get a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Total bits written so far (including buffered bits).
    pub fn bits_written(&self) -> u64 {
        self.total_bits_written
    }

    /// Write the low `count` bits of `value`, most significant first.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u32) -> Result<()> {
        debug_assert!(count <= 32, "Cannot write more than 32 bits at once");

        if count == 0 {
            return Ok(());
        }

        self.buffer = (self.buffer << count) | (value & mask(count)) as u64;
        self.bits_in_buffer += count;
        self.total_bits_written += count as u64;

        while self.bits_in_buffer >= 16 {
            self.bits_in_buffer -= 16;
            let word = (self.buffer >> self.bits_in_buffer) as u16;
            self.writer.write_all(&word.to_le_bytes())?;
            self.buffer &= (1u64 << self.bits_in_buffer) - 1;
        }

        Ok(())
    }

    /// Pad with zero bits up to the next 16-bit boundary.
    pub fn align_to_word(&mut self) -> Result<()> {
        if self.bits_in_buffer > 0 {
            self.write_bits(0, 16 - self.bits_in_buffer)?;
        }
        Ok(())
    }

    /// Align, then return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.align_to_word()?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_layout() {
        // 0b1 followed by fifteen zero bits -> word 0x8000, stored little-endian
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bits(1, 1).unwrap();
        let out = writer.finish().unwrap();
        assert_eq!(out, vec![0x00, 0x80]);
    }

    #[test]
    fn test_roundtrip_mixed_widths() {
        let values = [(0x5u32, 3u32), (0x1FFFF, 17), (0, 1), (0xABCD, 16), (0x3F, 6)];
        let mut writer = BitWriter::new(Vec::new());
        for &(v, n) in &values {
            writer.write_bits(v, n).unwrap();
        }
        let out = writer.finish().unwrap();
        assert_eq!(out.len() % 2, 0);

        let mut reader = BitReader::new(&out);
        for &(v, n) in &values {
            assert_eq!(reader.read_bits(n).unwrap(), v);
        }
    }

    #[test]
    fn test_read_past_end() {
        let data = [0xFFu8, 0xFF];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(16).unwrap(), 0xFFFF);
        assert!(reader.read_bit().is_err());
    }

    #[test]
    fn test_odd_trailing_byte() {
        let data = [0x34u8];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(16).unwrap(), 0x0034);
    }

    #[test]
    fn test_align_consumes_partial_word() {
        let data = [0x00u8, 0x80, 0x11, 0x22, 0x33];
        let mut reader = BitReader::new(&data);
        assert!(reader.read_bit().unwrap());
        reader.align_to_word().unwrap();
        let mut raw = [0u8; 3];
        reader.read_bytes(&mut raw).unwrap();
        assert_eq!(raw, [0x11, 0x22, 0x33]);
    }

    #[test]
    fn test_align_when_aligned_skips_whole_word() {
        let data = [0xAAu8, 0xBB, 0x11, 0x22];
        let mut reader = BitReader::new(&data);
        reader.align_to_word().unwrap();
        let mut raw = [0u8; 2];
        reader.read_bytes(&mut raw).unwrap();
        assert_eq!(raw, [0x11, 0x22]);
    }
}
