//! LZX decompression.
//!
//! The decoder consumes one compressed chunk per output frame. Everything
//! else (repeated offsets, previous code lengths, the open block and the
//! window history) carries over from frame to frame, so a stream must be
//! fed to a single decoder in order.

use crate::constants::{
    ALIGNED_NUM_ELEMENTS, BlockType, E8_FRAME_LIMIT, EXTRA_BITS, FRAME_SIZE, MIN_MATCH,
    MIN_WINDOW_BITS, MAX_WINDOW_BITS, NUM_CHARS, NUM_PRIMARY_LENGTHS, NUM_SECONDARY_LENGTHS,
    POSITION_BASE, PRETREE_NUM_ELEMENTS, main_elements, position_slots,
};
use crate::huffman::HuffmanTable;
use hecomp_core::BitReader;
use hecomp_core::error::{HecompError, Result};
use tracing::{debug, trace};

/// LZX decoder for one stream.
#[derive(Debug)]
pub struct LzxDecoder {
    /// Window size in bytes.
    window_size: usize,
    /// Main tree alphabet size for this window.
    main_elements: usize,
    /// Decoded bytes still reachable by matches.
    history: Vec<u8>,
    /// Repeated offsets R0, R1, R2.
    repeated: [usize; 3],
    /// Main tree lengths, kept for delta coding of the next block.
    main_lengths: Vec<u8>,
    /// Length tree lengths, kept for delta coding of the next block.
    length_lengths: Vec<u8>,
    main_table: HuffmanTable,
    length_table: HuffmanTable,
    aligned_table: HuffmanTable,
    /// Whether the stream header (E8 flag) has been read.
    header_read: bool,
    /// E8 translation size, zero when translation is off.
    intel_file_size: i64,
    /// Set once a block may contain E8 bytes.
    intel_started: bool,
    /// Type of the open block.
    block_type: BlockType,
    /// Declared size of the open block.
    block_length: usize,
    /// Bytes left in the open block.
    block_remaining: usize,
    /// Frames decoded so far.
    frame_index: u32,
    /// Stream offset of the next frame.
    output_offset: u64,
}

impl LzxDecoder {
    /// Create a decoder for a window of `2^window_bits` bytes.
    pub fn new(window_bits: u32) -> Result<Self> {
        let slots = position_slots(window_bits).ok_or_else(|| {
            debug!(window_bits, "rejecting LZX window outside {MIN_WINDOW_BITS}..={MAX_WINDOW_BITS}");
            HecompError::invalid_window_size(window_bits)
        })?;
        let main_elements = main_elements(slots);

        Ok(Self {
            window_size: 1 << window_bits,
            main_elements,
            history: Vec::new(),
            repeated: [1, 1, 1],
            main_lengths: vec![0; main_elements],
            length_lengths: vec![0; NUM_SECONDARY_LENGTHS],
            main_table: HuffmanTable::empty(),
            length_table: HuffmanTable::empty(),
            aligned_table: HuffmanTable::empty(),
            header_read: false,
            intel_file_size: 0,
            intel_started: false,
            block_type: BlockType::Verbatim,
            block_length: 0,
            block_remaining: 0,
            frame_index: 0,
            output_offset: 0,
        })
    }

    /// Window size in bytes.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Total bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.output_offset
    }

    /// Decode one frame of `frame_len` bytes from one compressed chunk.
    pub fn decompress_frame(&mut self, chunk: &[u8], frame_len: usize) -> Result<Vec<u8>> {
        if frame_len == 0 || frame_len > FRAME_SIZE {
            return Err(HecompError::corrupted(
                self.output_offset,
                format!("Invalid LZX frame length {}", frame_len),
            ));
        }

        let mut reader = BitReader::new(chunk);

        if !self.header_read {
            if reader.read_bit()? {
                let high = reader.read_bits(16)? as i64;
                let low = reader.read_bits(16)? as i64;
                self.intel_file_size = (high << 16) | low;
            }
            self.header_read = true;
            debug!(intel_file_size = self.intel_file_size, "read LZX stream header");
        }

        let frame_start = self.history.len();
        let frame_end = frame_start + frame_len;

        while self.history.len() < frame_end {
            if self.block_remaining == 0 {
                self.read_block_header(&mut reader)?;
            }

            let limit = self.block_remaining.min(frame_end - self.history.len());
            match self.block_type {
                BlockType::Verbatim => self.decode_symbol(&mut reader, limit, false)?,
                BlockType::Aligned => self.decode_symbol(&mut reader, limit, true)?,
                BlockType::Uncompressed => self.copy_stored(&mut reader, limit)?,
            }
        }

        let mut frame = self.history[frame_start..frame_end].to_vec();

        if self.intel_started
            && self.intel_file_size != 0
            && self.frame_index < E8_FRAME_LIMIT
            && frame_len > 10
        {
            self.undo_e8_translation(&mut frame);
        }

        trace!(
            frame = self.frame_index,
            chunk_len = chunk.len(),
            frame_len,
            "decoded LZX frame"
        );

        self.frame_index += 1;
        self.output_offset += frame_len as u64;
        self.trim_history();

        Ok(frame)
    }

    /// Keep only the bytes a match can still reach.
    fn trim_history(&mut self) {
        if self.history.len() > 2 * self.window_size {
            let excess = self.history.len() - self.window_size;
            self.history.drain(..excess);
        }
    }

    fn read_block_header(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        let type_bits = reader.read_bits(3)?;
        let block_type = BlockType::from_bits(type_bits).ok_or_else(|| {
            HecompError::corrupted(
                self.output_offset,
                format!("Invalid LZX block type {}", type_bits),
            )
        })?;

        let high = reader.read_bits(16)? as usize;
        let low = reader.read_bits(8)? as usize;
        let block_length = (high << 8) | low;
        if block_length == 0 {
            return Err(HecompError::corrupted(
                self.output_offset,
                "Zero-length LZX block",
            ));
        }

        match block_type {
            BlockType::Aligned => {
                let mut aligned_lengths = [0u8; ALIGNED_NUM_ELEMENTS];
                for len in aligned_lengths.iter_mut() {
                    *len = reader.read_bits(3)? as u8;
                }
                self.aligned_table = HuffmanTable::from_lengths(&aligned_lengths)?;
                self.read_main_and_length_trees(reader)?;
            }
            BlockType::Verbatim => self.read_main_and_length_trees(reader)?,
            BlockType::Uncompressed => {
                self.intel_started = true;
                reader.align_to_word()?;
                let mut registers = [0u8; 12];
                reader.read_bytes(&mut registers)?;
                for (slot, bytes) in registers.chunks_exact(4).enumerate() {
                    self.repeated[slot] =
                        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
                }
            }
        }

        debug!(?block_type, block_length, "read LZX block header");

        self.block_type = block_type;
        self.block_length = block_length;
        self.block_remaining = block_length;
        Ok(())
    }

    fn read_main_and_length_trees(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        read_lengths(reader, &mut self.main_lengths, 0, NUM_CHARS)?;
        read_lengths(reader, &mut self.main_lengths, NUM_CHARS, self.main_elements)?;
        self.main_table = HuffmanTable::from_lengths(&self.main_lengths)?;
        if self.main_lengths[0xE8] != 0 {
            self.intel_started = true;
        }

        read_lengths(reader, &mut self.length_lengths, 0, NUM_SECONDARY_LENGTHS)?;
        self.length_table = HuffmanTable::from_lengths(&self.length_lengths)?;
        Ok(())
    }

    /// Decode one literal or match from a verbatim or aligned block.
    fn decode_symbol(
        &mut self,
        reader: &mut BitReader<'_>,
        limit: usize,
        aligned: bool,
    ) -> Result<()> {
        let symbol = self.main_table.decode(reader)? as usize;

        if symbol < NUM_CHARS {
            self.history.push(symbol as u8);
            self.block_remaining -= 1;
            return Ok(());
        }

        let symbol = symbol - NUM_CHARS;
        let mut length = symbol & NUM_PRIMARY_LENGTHS;
        if length == NUM_PRIMARY_LENGTHS {
            length += self.length_table.decode(reader)? as usize;
        }
        length += MIN_MATCH;

        let slot = symbol >> 3;
        let offset = match slot {
            0 => self.repeated[0],
            1 => {
                self.repeated.swap(0, 1);
                self.repeated[0]
            }
            2 => {
                self.repeated.swap(0, 2);
                self.repeated[0]
            }
            _ => {
                let extra = EXTRA_BITS[slot] as u32;
                let base = POSITION_BASE[slot] as usize - 2;
                let offset = if aligned && extra >= 3 {
                    let verbatim = (reader.read_bits(extra - 3)? as usize) << 3;
                    let aligned_bits = self.aligned_table.decode(reader)? as usize;
                    base + verbatim + aligned_bits
                } else {
                    base + reader.read_bits(extra)? as usize
                };
                self.repeated[2] = self.repeated[1];
                self.repeated[1] = self.repeated[0];
                self.repeated[0] = offset;
                offset
            }
        };

        if length > limit {
            return Err(HecompError::corrupted(
                self.output_offset,
                format!(
                    "Match of {} bytes overruns block or frame ({} bytes left)",
                    length, limit
                ),
            ));
        }
        if offset == 0 || offset > self.history.len() || offset > self.window_size {
            return Err(HecompError::invalid_distance(offset, self.history.len()));
        }

        let start = self.history.len() - offset;
        if offset >= length {
            self.history.extend_from_within(start..start + length);
        } else {
            for i in 0..length {
                let byte = self.history[start + i];
                self.history.push(byte);
            }
        }
        self.block_remaining -= length;
        Ok(())
    }

    /// Copy raw bytes from an uncompressed block.
    fn copy_stored(&mut self, reader: &mut BitReader<'_>, limit: usize) -> Result<()> {
        let start = self.history.len();
        self.history.resize(start + limit, 0);
        reader.read_bytes(&mut self.history[start..])?;
        self.block_remaining -= limit;

        if self.block_remaining == 0 && self.block_length & 1 == 1 {
            reader.skip_byte();
        }
        Ok(())
    }

    /// Reverse the encoder's E8 call translation on one frame.
    fn undo_e8_translation(&self, frame: &mut [u8]) {
        let file_size = self.intel_file_size;
        let end = frame.len() - 10;
        let mut current = self.output_offset as i64;
        let mut i = 0;

        while i < end {
            if frame[i] != 0xE8 {
                i += 1;
                current += 1;
                continue;
            }

            let absolute =
                i32::from_le_bytes([frame[i + 1], frame[i + 2], frame[i + 3], frame[i + 4]]) as i64;
            if absolute >= -current && absolute < file_size {
                let relative = if absolute >= 0 {
                    absolute - current
                } else {
                    absolute + file_size
                };
                frame[i + 1..i + 5].copy_from_slice(&(relative as i32).to_le_bytes());
            }
            i += 5;
            current += 5;
        }
    }
}

/// Read pretree-coded code lengths for `lengths[first..last]`.
///
/// Each length is sent as a delta against the previous block's value, so
/// `lengths` must hold the previous block's lengths on entry.
fn read_lengths(
    reader: &mut BitReader<'_>,
    lengths: &mut [u8],
    first: usize,
    last: usize,
) -> Result<()> {
    let mut pretree_lengths = [0u8; PRETREE_NUM_ELEMENTS];
    for len in pretree_lengths.iter_mut() {
        *len = reader.read_bits(4)? as u8;
    }
    let pretree = HuffmanTable::from_lengths(&pretree_lengths)?;

    let overrun = |x: usize, run: usize| {
        HecompError::invalid_header(format!(
            "Code length run of {} at {} overruns table of {}",
            run, x, last
        ))
    };

    let mut x = first;
    while x < last {
        match pretree.decode(reader)? {
            17 => {
                let run = reader.read_bits(4)? as usize + 4;
                if x + run > last {
                    return Err(overrun(x, run));
                }
                lengths[x..x + run].fill(0);
                x += run;
            }
            18 => {
                let run = reader.read_bits(5)? as usize + 20;
                if x + run > last {
                    return Err(overrun(x, run));
                }
                lengths[x..x + run].fill(0);
                x += run;
            }
            19 => {
                let run = reader.read_bits(1)? as usize + 4;
                if x + run > last {
                    return Err(overrun(x, run));
                }
                let delta = pretree.decode(reader)?;
                if delta > 16 {
                    return Err(HecompError::invalid_header(format!(
                        "Invalid code length delta {} in same-length run",
                        delta
                    )));
                }
                let value = (lengths[x] + 17 - delta as u8) % 17;
                lengths[x..x + run].fill(value);
                x += run;
            }
            delta => {
                lengths[x] = (lengths[x] + 17 - delta as u8) % 17;
                x += 1;
            }
        }
    }
    Ok(())
}
