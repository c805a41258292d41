//! MSZIP folder decoding.
//!
//! Every CFDATA block of an MSZIP folder is `CK` followed by a raw deflate
//! stream. Matches in one block may reach back into the output of the
//! blocks before it, up to 32 KiB.

use flate2::{Decompress, FlushDecompress, Status};
use hecomp_core::{HecompError, Result};
use tracing::trace;

/// Signature at the start of every MSZIP block.
pub const SIGNATURE: [u8; 2] = *b"CK";

/// Deflate history carried from one block to the next.
pub const HISTORY_SIZE: usize = 32 * 1024;

/// Decoder for the blocks of one MSZIP folder, in order.
#[derive(Debug, Default)]
pub struct MsZipDecoder {
    history: Vec<u8>,
    output_offset: u64,
}

impl MsZipDecoder {
    /// Create a decoder with empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes decoded so far.
    pub fn total_out(&self) -> u64 {
        self.output_offset
    }

    /// Decode one block that must expand to exactly `uncompressed_size` bytes.
    pub fn decompress_block(&mut self, block: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
        let payload = block.strip_prefix(&SIGNATURE[..]).ok_or_else(|| {
            HecompError::corrupted(self.output_offset, "Missing MSZIP block signature")
        })?;

        // The history is replayed as a non-final stored block in front of
        // the payload, so back-references into it resolve.
        let prefix = self.history.len();
        let mut stream = Vec::with_capacity(5 + prefix + payload.len());
        if prefix > 0 {
            let len = prefix as u16;
            stream.push(0x00);
            stream.extend_from_slice(&len.to_le_bytes());
            stream.extend_from_slice(&(!len).to_le_bytes());
            stream.extend_from_slice(&self.history);
        }
        stream.extend_from_slice(payload);

        // One spare byte lets an overlong block show up as a size mismatch.
        let mut output = Vec::with_capacity(prefix + uncompressed_size + 1);
        let mut inflater = Decompress::new(false);
        let status = inflater
            .decompress_vec(&stream, &mut output, FlushDecompress::Finish)
            .map_err(|e| {
                HecompError::corrupted(self.output_offset, format!("MSZIP inflate failed: {}", e))
            })?;

        if status != Status::StreamEnd {
            return Err(HecompError::corrupted(
                self.output_offset,
                format!(
                    "MSZIP block did not end within {} bytes",
                    uncompressed_size
                ),
            ));
        }

        let decoded = output.len() - prefix;
        if decoded != uncompressed_size {
            return Err(HecompError::corrupted(
                self.output_offset,
                format!(
                    "MSZIP block size mismatch: {} != {}",
                    decoded, uncompressed_size
                ),
            ));
        }

        let frame = output[prefix..].to_vec();
        let excess = output.len().saturating_sub(HISTORY_SIZE);
        output.drain(..excess);
        self.history = output;
        self.output_offset += decoded as u64;

        trace!(
            compressed = block.len(),
            uncompressed = decoded,
            "decoded MSZIP block"
        );

        Ok(frame)
    }
}
