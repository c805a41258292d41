//! XCompress container header.
//!
//! Fixed 48-byte layout, every field in the file's byte order:
//!
//! ```text
//! 0x00  identifier                 u32
//! 0x04  contextFlags               u32
//! 0x08  flags                      u32
//! 0x0C  windowSize                 u32
//! 0x10  compressionPartitionSize   u32
//! 0x14  version                    u16
//! 0x16  reserved                   u16
//! 0x18  uncompressedSize           u64
//! 0x20  compressedSize             u64
//! 0x28  uncompressedBlockSize      u32
//! 0x2C  compressedBlockSizeMax     u32
//! ```

use crate::detect::{Signature, XCOMPRESS_MAGIC};
use hecomp_core::ByteOrder;
use hecomp_core::error::{HecompError, Result};
use hecomp_lzx::MAX_WINDOW_BITS;
use tracing::warn;

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 48;

/// Window exponent used when the header's window size is unusable.
pub const DEFAULT_WINDOW_BITS: u32 = 17;

/// XCompress header with all fields in host order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XCompressHeader {
    /// Context flags.
    pub context_flags: u32,
    /// Flags.
    pub flags: u32,
    /// LZX window size in bytes.
    pub window_size: u32,
    /// Compression partition size.
    pub compression_partition_size: u32,
    /// Format version.
    pub version: u16,
    /// Reserved.
    pub reserved: u16,
    /// Total decoded size.
    pub uncompressed_size: u64,
    /// Bytes following the header.
    pub compressed_size: u64,
    /// Decoded size of one block.
    pub uncompressed_block_size: u32,
    /// Largest compressed block.
    pub compressed_block_size_max: u32,
}

impl XCompressHeader {
    /// Parse a header, returning it with the byte order it was stored in.
    pub fn parse(bytes: &[u8]) -> Result<(Self, ByteOrder)> {
        if bytes.len() < HEADER_SIZE {
            return Err(HecompError::invalid_header(format!(
                "XCompress header needs {} bytes, found {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let order = match Signature::from_bytes(bytes) {
            Signature::XCompress(order) => order,
            _ => {
                return Err(HecompError::invalid_magic(
                    XCOMPRESS_MAGIC.to_be_bytes().to_vec(),
                    bytes[..4].to_vec(),
                ));
            }
        };

        let header = Self {
            context_flags: order.read_u32(&bytes[0x04..]),
            flags: order.read_u32(&bytes[0x08..]),
            window_size: order.read_u32(&bytes[0x0C..]),
            compression_partition_size: order.read_u32(&bytes[0x10..]),
            version: order.read_u16(&bytes[0x14..]),
            reserved: order.read_u16(&bytes[0x16..]),
            uncompressed_size: order.read_u64(&bytes[0x18..]),
            compressed_size: order.read_u64(&bytes[0x20..]),
            uncompressed_block_size: order.read_u32(&bytes[0x28..]),
            compressed_block_size_max: order.read_u32(&bytes[0x2C..]),
        };

        Ok((header, order))
    }

    /// Serialize the header in the given byte order.
    pub fn to_bytes(&self, order: ByteOrder) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0x00..0x04].copy_from_slice(&order.u32_bytes(XCOMPRESS_MAGIC));
        out[0x04..0x08].copy_from_slice(&order.u32_bytes(self.context_flags));
        out[0x08..0x0C].copy_from_slice(&order.u32_bytes(self.flags));
        out[0x0C..0x10].copy_from_slice(&order.u32_bytes(self.window_size));
        out[0x10..0x14].copy_from_slice(&order.u32_bytes(self.compression_partition_size));
        out[0x14..0x16].copy_from_slice(&order.u16_bytes(self.version));
        out[0x16..0x18].copy_from_slice(&order.u16_bytes(self.reserved));
        out[0x18..0x20].copy_from_slice(&order.u64_bytes(self.uncompressed_size));
        out[0x20..0x28].copy_from_slice(&order.u64_bytes(self.compressed_size));
        out[0x28..0x2C].copy_from_slice(&order.u32_bytes(self.uncompressed_block_size));
        out[0x2C..0x30].copy_from_slice(&order.u32_bytes(self.compressed_block_size_max));
        out
    }

    /// LZX window exponent: trailing zero bits of the window size, or 17
    /// when that count is 0 or above 21.
    pub fn window_exponent(&self) -> u32 {
        let bits = if self.window_size == 0 {
            0
        } else {
            self.window_size.trailing_zeros()
        };

        if bits == 0 || bits > MAX_WINDOW_BITS {
            warn!(
                window_size = self.window_size,
                "unusable XCompress window size, using 2^{DEFAULT_WINDOW_BITS}"
            );
            DEFAULT_WINDOW_BITS
        } else {
            bits
        }
    }
}
