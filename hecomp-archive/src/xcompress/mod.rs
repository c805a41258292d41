//! XCompress container codec.
//!
//! ```text
//! +----------------+------------+------------------------------+---------+
//! | header (48)    | blockLen   | micro-framed LZX chunks      | 00 x 5  |
//! |                | (u32 BE)   |                              |         |
//! +----------------+------------+------------------------------+---------+
//! ```
//!
//! A container holds a sequence of blocks, each a big-endian length
//! followed by that many bytes of micro-framed LZX. Files written here
//! hold exactly one block; its length is the header's
//! `compressedBlockSizeMax` and covers the zero trailer as well.

pub mod header;

pub use header::{DEFAULT_WINDOW_BITS, HEADER_SIZE, XCompressHeader};

use crate::cab::{self, CabBlockTable};
use hecomp_core::{ByteOrder, HecompError, Result};
use hecomp_lzx::{FRAME_SIZE, decode_framed, write_frame_header};
use tracing::{debug, trace, warn};

/// Window exponent written by the encoder.
pub const WINDOW_BITS: u32 = 17;

/// Compression partition size written by the encoder.
pub const PARTITION_SIZE: u32 = 0x80000;

/// Format version written by the encoder.
pub const VERSION: u16 = 0x0103;

/// Zero padding closing every encoded stream.
pub const TRAILER: [u8; 5] = [0; 5];

/// Size of a block length prefix.
const BLOCK_PREFIX_SIZE: usize = 4;

/// Decode an XCompress container.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>> {
    let (header, order) = XCompressHeader::parse(input)?;
    let window_bits = header.window_exponent();

    debug!(
        %order,
        window_bits,
        uncompressed = header.uncompressed_size,
        compressed = header.compressed_size,
        block = header.uncompressed_block_size,
        block_max = header.compressed_block_size_max,
        "parsed XCompress header"
    );

    let total = usize::try_from(header.uncompressed_size).map_err(|_| {
        HecompError::input_too_large(header.uncompressed_size, usize::MAX as u64)
    })?;
    let block_size = header.uncompressed_block_size as usize;
    let max_chunk = header.compressed_block_size_max as usize;

    let mut output = Vec::new();
    let mut pos = HEADER_SIZE;

    while output.len() < total && pos < input.len() {
        let Some(prefix) = input.get(pos..pos + BLOCK_PREFIX_SIZE) else {
            break;
        };
        let block_len = ByteOrder::Big.read_u32(prefix) as usize;
        pos += BLOCK_PREFIX_SIZE;

        let remaining = input.len() - pos;
        if block_len > remaining {
            return Err(HecompError::corrupted(
                pos as u64,
                format!(
                    "Block of {} bytes exceeds remaining {} bytes",
                    block_len, remaining
                ),
            ));
        }

        let target = block_size.min(total - output.len());
        trace!(offset = pos, block_len, target, "XCompress block");
        decode_framed(
            &input[pos..pos + block_len],
            window_bits,
            max_chunk,
            target,
            &mut output,
        )?;
        pos += block_len;
    }

    if output.len() < total {
        warn!(
            produced = output.len(),
            expected = total,
            "XCompress input ended before the declared size"
        );
    }

    Ok(output)
}

/// Encode `input` as an XCompress container.
///
/// The data is compressed into a single-file LZX cabinet named `name`,
/// whose data blocks are then re-framed into one XCompress block. The
/// header is always written big-endian.
pub fn compress(input: &[u8], name: &str) -> Result<Vec<u8>> {
    let size = u32::try_from(input.len())
        .map_err(|_| HecompError::input_too_large(input.len() as u64, u32::MAX as u64))?;

    let cabinet = cab::compress(input, name, WINDOW_BITS)?;
    let table = CabBlockTable::parse(&cabinet)?;

    let mut out = vec![0u8; HEADER_SIZE + BLOCK_PREFIX_SIZE];
    for block in table.blocks() {
        let uncompressed = block.uncompressed_size as usize;
        if uncompressed != FRAME_SIZE {
            trace!(uncompressed, "short frame, escaped length");
        }
        write_frame_header(&mut out, block.data.len(), uncompressed)?;
        out.extend_from_slice(block.data);
    }
    out.extend_from_slice(&TRAILER);

    let block_region = out.len() - HEADER_SIZE - BLOCK_PREFIX_SIZE;
    let block_max = u32::try_from(block_region)
        .map_err(|_| HecompError::input_too_large(block_region as u64, u32::MAX as u64))?;

    let header = XCompressHeader {
        context_flags: 0,
        flags: 0,
        window_size: 1 << WINDOW_BITS,
        compression_partition_size: PARTITION_SIZE,
        version: VERSION,
        reserved: 0,
        uncompressed_size: size as u64,
        compressed_size: (out.len() - HEADER_SIZE) as u64,
        uncompressed_block_size: size,
        compressed_block_size_max: block_max,
    };
    out[..HEADER_SIZE].copy_from_slice(&header.to_bytes(ByteOrder::Big));
    out[HEADER_SIZE..HEADER_SIZE + BLOCK_PREFIX_SIZE]
        .copy_from_slice(&ByteOrder::Big.u32_bytes(block_max));

    debug!(
        input = input.len(),
        frames = table.len(),
        output = out.len(),
        "built XCompress container"
    );

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Signature;

    #[test]
    fn test_encoded_layout() {
        let out = compress(&[1, 2, 3], "abc.bin").unwrap();
        let (header, order) = XCompressHeader::parse(&out).unwrap();

        assert_eq!(order, ByteOrder::Big);
        assert_eq!(header.uncompressed_size, 3);
        assert_eq!(header.uncompressed_block_size, 3);
        assert_eq!(header.window_size, 1 << 17);
        assert_eq!(header.compression_partition_size, 0x80000);
        assert_eq!(header.version, 0x0103);
        assert_eq!(header.compressed_size as usize, out.len() - HEADER_SIZE);
        assert_eq!(
            header.compressed_block_size_max as usize,
            out.len() - HEADER_SIZE - 4
        );

        // Duplicated block size, then the escaped micro-frame header
        assert_eq!(
            ByteOrder::Big.read_u32(&out[HEADER_SIZE..]),
            header.compressed_block_size_max
        );
        assert_eq!(&out[HEADER_SIZE + 4..HEADER_SIZE + 7], &[0xFF, 0x00, 0x03]);
        assert_eq!(&out[out.len() - 5..], &TRAILER);
    }

    #[test]
    fn test_full_frames_are_not_escaped() {
        let data = vec![7u8; FRAME_SIZE];
        let out = compress(&data, "f").unwrap();
        assert_ne!(out[HEADER_SIZE + 4], 0xFF);
        assert_eq!(decompress(&out).unwrap(), data);
    }

    #[test]
    fn test_roundtrip() {
        let data: Vec<u8> = (0..100_000u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8 & 0x0F)
            .collect();
        let out = compress(&data, "data.bin").unwrap();
        assert!(Signature::from_bytes(&out).is_compressed());
        assert_eq!(decompress(&out).unwrap(), data);
    }

    #[test]
    fn test_empty_input() {
        let out = compress(&[], "empty").unwrap();
        assert_eq!(out.len(), HEADER_SIZE + 4 + TRAILER.len());
        assert!(decompress(&out).unwrap().is_empty());
    }

    #[test]
    fn test_header_only() {
        let header = XCompressHeader {
            window_size: 1 << 17,
            ..Default::default()
        };
        let bytes = header.to_bytes(ByteOrder::Big);
        assert!(decompress(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_block_overruns_input() {
        let mut out = compress(b"overrun", "o").unwrap();
        let len = ByteOrder::Big.read_u32(&out[HEADER_SIZE..]);
        out[HEADER_SIZE..HEADER_SIZE + 4].copy_from_slice(&ByteOrder::Big.u32_bytes(len + 1));
        assert!(matches!(
            decompress(&out),
            Err(HecompError::CorruptedData { .. })
        ));
    }

    #[test]
    fn test_bad_window_fails() {
        let mut out = compress(b"window", "w").unwrap();
        // 2^14 is a valid exponent for the header but not for LZX
        out[0x0C..0x10].copy_from_slice(&ByteOrder::Big.u32_bytes(1 << 14));
        assert!(matches!(
            decompress(&out),
            Err(HecompError::InvalidWindowSize { bits: 14 })
        ));
    }

    #[test]
    fn test_truncated_header() {
        let out = compress(b"abc", "t").unwrap();
        assert!(decompress(&out[..HEADER_SIZE - 1]).is_err());
    }
}
