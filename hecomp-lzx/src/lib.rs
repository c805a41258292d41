//! # hecomp LZX
//!
//! Pure Rust implementation of the LZX compression format as used by
//! Cabinet archives and XCompress containers.
//!
//! LZX is an LZ77 variant with a power-of-two sliding window (2^15 to
//! 2^21 bytes), three repeated-offset registers and canonical Huffman
//! coding. Output is produced in frames of 32768 bytes; each frame is
//! carried by one compressed chunk that ends on a 16-bit boundary.
//!
//! - [`LzxDecoder`]: verbatim, aligned-offset and uncompressed blocks,
//!   Intel E8 call translation
//! - [`LzxEncoder`]: greedy hash-chain matching into verbatim blocks, with
//!   an uncompressed fallback for incompressible frames
//! - [`FrameReader`]: the length-prefixed micro-frame protocol used inside
//!   XCompress blocks
//!
//! ## Example
//!
//! ```rust
//! use hecomp_lzx::{decode_framed, encode_framed};
//!
//! let data = b"Hello, Hello, Hello, LZX!".repeat(10);
//! let framed = encode_framed(&data, 17).unwrap();
//!
//! let mut output = Vec::new();
//! decode_framed(&framed, 17, 0, data.len(), &mut output).unwrap();
//! assert_eq!(output, data);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod decode;
pub mod encode;
pub mod frame;
pub mod huffman;

// Re-exports
pub use constants::{BlockType, FRAME_SIZE, MAX_WINDOW_BITS, MIN_WINDOW_BITS};
pub use decode::LzxDecoder;
pub use encode::LzxEncoder;
pub use frame::{FrameReader, write_frame_header};

use hecomp_core::error::{HecompError, Result};

/// Decode a micro-framed LZX stream into `output`.
///
/// Frames are read until `output_length` bytes have been produced; every
/// frame but the last yields [`FRAME_SIZE`] bytes. A `max_chunk_size` of
/// zero disables the per-chunk size check.
pub fn decode_framed(
    input: &[u8],
    window_bits: u32,
    max_chunk_size: usize,
    output_length: usize,
    output: &mut Vec<u8>,
) -> Result<()> {
    let mut decoder = LzxDecoder::new(window_bits)?;
    let mut frames = FrameReader::new(input);
    let mut produced = 0;

    output.reserve(output_length);

    while produced < output_length {
        let chunk = frames.next_frame().ok_or_else(|| {
            HecompError::corrupted(
                frames.position() as u64,
                format!(
                    "LZX stream ended after {} of {} bytes",
                    produced, output_length
                ),
            )
        })?;

        if max_chunk_size > 0 && chunk.len() > max_chunk_size {
            return Err(HecompError::corrupted(
                frames.position() as u64,
                format!(
                    "LZX chunk of {} bytes exceeds limit of {}",
                    chunk.len(),
                    max_chunk_size
                ),
            ));
        }

        let frame_len = (output_length - produced).min(FRAME_SIZE);
        output.extend(decoder.decompress_frame(chunk, frame_len)?);
        produced += frame_len;
    }

    Ok(())
}

/// Compress `data` into a micro-framed LZX stream.
///
/// The inverse of [`decode_framed`]; the stream carries no terminator.
pub fn encode_framed(data: &[u8], window_bits: u32) -> Result<Vec<u8>> {
    let mut encoder = LzxEncoder::new(window_bits)?;
    let mut output = Vec::new();

    for frame in data.chunks(FRAME_SIZE) {
        let chunk = encoder.compress_frame(frame)?;
        write_frame_header(&mut output, chunk.len(), frame.len())?;
        output.extend_from_slice(&chunk);
    }

    Ok(output)
}
