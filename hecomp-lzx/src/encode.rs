//! LZX compression.
//!
//! Each frame becomes one 16-bit aligned chunk holding a single block:
//! a verbatim block built from greedy hash-chain matches, or an
//! uncompressed block when that turns out smaller. Matches may reach back
//! into earlier frames of the same stream but never past the end of the
//! current frame.

use crate::constants::{
    BlockType, EXTRA_BITS, FRAME_SIZE, MAX_CODE_LENGTH, MAX_MATCH, MIN_MATCH, NUM_CHARS,
    NUM_PRIMARY_LENGTHS, NUM_SECONDARY_LENGTHS, POSITION_BASE, PRETREE_MAX_CODE_LENGTH,
    PRETREE_NUM_ELEMENTS, main_elements, position_slot, position_slots,
};
use crate::huffman::{build_lengths, canonical_codes};
use hecomp_core::BitWriter;
use hecomp_core::error::{HecompError, Result};
use tracing::trace;

/// Hash table size (log2).
const HASH_BITS: u32 = 15;

/// Maximum hash chain entries examined per position.
const MAX_CHAIN: usize = 64;

/// Shortest match worth emitting.
const MIN_ENCODED_MATCH: usize = 3;

/// Empty hash slot.
const NIL: usize = usize::MAX;

/// Hash chains over absolute stream positions.
#[derive(Debug)]
struct MatchFinder {
    head: Vec<usize>,
    prev: Vec<usize>,
    mask: usize,
    max_distance: usize,
}

impl MatchFinder {
    fn new(window_size: usize) -> Self {
        Self {
            head: vec![NIL; 1 << HASH_BITS],
            prev: vec![NIL; window_size],
            mask: window_size - 1,
            max_distance: window_size - 3,
        }
    }

    fn hash(buffer: &[u8], idx: usize) -> usize {
        let value = ((buffer[idx] as u32) << 16)
            | ((buffer[idx + 1] as u32) << 8)
            | buffer[idx + 2] as u32;
        (value.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize
    }

    fn insert(&mut self, buffer: &[u8], base: usize, pos: usize) {
        let idx = pos - base;
        if idx + 3 > buffer.len() {
            return;
        }
        let h = Self::hash(buffer, idx);
        self.prev[pos & self.mask] = self.head[h];
        self.head[h] = pos;
    }

    /// Longest earlier match at `pos`, as (length, distance).
    fn find(&self, buffer: &[u8], base: usize, pos: usize, max_len: usize) -> Option<(usize, usize)> {
        let idx = pos - base;
        if idx + 3 > buffer.len() {
            return None;
        }

        let mut best: Option<(usize, usize)> = None;
        let mut candidate = self.head[Self::hash(buffer, idx)];
        let mut depth = 0;

        while candidate != NIL && candidate < pos && candidate >= base && depth < MAX_CHAIN {
            let distance = pos - candidate;
            if distance > self.max_distance {
                break;
            }

            let len = match_length(buffer, candidate - base, idx, max_len);
            if len >= MIN_ENCODED_MATCH && best.is_none_or(|(best_len, _)| len > best_len) {
                best = Some((len, distance));
                if len == max_len {
                    break;
                }
            }

            let next = self.prev[candidate & self.mask];
            if next >= candidate {
                break;
            }
            candidate = next;
            depth += 1;
        }

        best
    }
}

fn match_length(buffer: &[u8], earlier: usize, current: usize, max_len: usize) -> usize {
    let mut len = 0;
    while len < max_len && buffer[earlier + len] == buffer[current + len] {
        len += 1;
    }
    len
}

/// One coded element of a verbatim block.
#[derive(Debug, Clone, Copy)]
enum Token {
    Literal(u8),
    Match {
        main_symbol: u16,
        length_symbol: Option<u8>,
        extra_bits: u8,
        verbatim: u32,
    },
}

/// LZX encoder for one stream.
#[derive(Debug)]
pub struct LzxEncoder {
    main_elements: usize,
    max_distance: usize,
    window_size: usize,
    finder: MatchFinder,
    /// Recent input; `buffer[0]` is stream position `base`.
    buffer: Vec<u8>,
    base: usize,
    repeated: [usize; 3],
    main_lengths: Vec<u8>,
    length_lengths: Vec<u8>,
    header_written: bool,
    frame_index: u32,
}

impl LzxEncoder {
    /// Create an encoder for a window of `2^window_bits` bytes.
    pub fn new(window_bits: u32) -> Result<Self> {
        let slots = position_slots(window_bits)
            .ok_or_else(|| HecompError::invalid_window_size(window_bits))?;
        let main_elements = main_elements(slots);
        let window_size = 1usize << window_bits;

        Ok(Self {
            main_elements,
            max_distance: window_size - 3,
            window_size,
            finder: MatchFinder::new(window_size),
            buffer: Vec::new(),
            base: 0,
            repeated: [1, 1, 1],
            main_lengths: vec![0; main_elements],
            length_lengths: vec![0; NUM_SECONDARY_LENGTHS],
            header_written: false,
            frame_index: 0,
        })
    }

    /// Compress one frame (1 to 32768 bytes). Every frame but the last of
    /// a stream must be exactly 32768 bytes.
    pub fn compress_frame(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        if frame.is_empty() || frame.len() > FRAME_SIZE {
            return Err(HecompError::corrupted(
                self.base as u64,
                format!("Invalid LZX frame length {}", frame.len()),
            ));
        }

        let start = self.base + self.buffer.len();
        self.buffer.extend_from_slice(frame);
        let end = start + frame.len();

        let (tokens, repeated) = self.tokenize(start, end);
        let (verbatim, main_lengths, length_lengths) = self.write_verbatim_block(&tokens, frame.len())?;
        let stored = self.write_stored_block(frame)?;

        let chunk = if verbatim.len() <= stored.len() {
            self.repeated = repeated;
            self.main_lengths = main_lengths;
            self.length_lengths = length_lengths;
            verbatim
        } else {
            stored
        };

        trace!(
            frame = self.frame_index,
            tokens = tokens.len(),
            frame_len = frame.len(),
            chunk_len = chunk.len(),
            "encoded LZX frame"
        );

        self.header_written = true;
        self.frame_index += 1;
        self.trim_buffer();
        Ok(chunk)
    }

    fn trim_buffer(&mut self) {
        if self.buffer.len() > 2 * self.window_size {
            let excess = self.buffer.len() - self.window_size;
            self.buffer.drain(..excess);
            self.base += excess;
        }
    }

    /// Greedy parse of `start..end`, returning the tokens and the repeated
    /// offsets they leave behind.
    fn tokenize(&mut self, start: usize, end: usize) -> (Vec<Token>, [usize; 3]) {
        let mut repeated = self.repeated;
        let mut tokens = Vec::new();
        let mut pos = start;

        while pos < end {
            let idx = pos - self.base;
            let max_len = (end - pos).min(MAX_MATCH);

            let mut best = None;
            if max_len >= MIN_ENCODED_MATCH {
                best = self.finder.find(&self.buffer, self.base, pos, max_len);

                for &r in &repeated {
                    if r == 0 || r > idx || r > self.max_distance {
                        continue;
                    }
                    let len = match_length(&self.buffer, idx - r, idx, max_len);
                    if len >= MIN_ENCODED_MATCH
                        && best.is_none_or(|(best_len, _)| len + 1 >= best_len)
                    {
                        best = Some((len, r));
                        break;
                    }
                }
            }

            let advance = match best {
                Some((len, distance)) => {
                    tokens.push(match_token(len, distance, &mut repeated));
                    len
                }
                None => {
                    tokens.push(Token::Literal(self.buffer[idx]));
                    1
                }
            };

            for p in pos..pos + advance {
                self.finder.insert(&self.buffer, self.base, p);
            }
            pos += advance;
        }

        (tokens, repeated)
    }

    fn write_verbatim_block(
        &self,
        tokens: &[Token],
        block_len: usize,
    ) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
        let mut main_freq = vec![0u32; self.main_elements];
        let mut length_freq = vec![0u32; NUM_SECONDARY_LENGTHS];
        for token in tokens {
            match *token {
                Token::Literal(byte) => main_freq[byte as usize] += 1,
                Token::Match {
                    main_symbol,
                    length_symbol,
                    ..
                } => {
                    main_freq[main_symbol as usize] += 1;
                    if let Some(symbol) = length_symbol {
                        length_freq[symbol as usize] += 1;
                    }
                }
            }
        }

        let main_lengths = build_lengths(&main_freq, MAX_CODE_LENGTH);
        let length_lengths = build_lengths(&length_freq, MAX_CODE_LENGTH);
        let main_codes = canonical_codes(&main_lengths);
        let length_codes = canonical_codes(&length_lengths);

        let mut writer = BitWriter::new(Vec::new());
        self.write_block_header(&mut writer, BlockType::Verbatim, block_len)?;

        write_lengths(
            &mut writer,
            &self.main_lengths[..NUM_CHARS],
            &main_lengths[..NUM_CHARS],
        )?;
        write_lengths(
            &mut writer,
            &self.main_lengths[NUM_CHARS..],
            &main_lengths[NUM_CHARS..],
        )?;
        write_lengths(&mut writer, &self.length_lengths, &length_lengths)?;

        for token in tokens {
            match *token {
                Token::Literal(byte) => {
                    let s = byte as usize;
                    writer.write_bits(main_codes[s], main_lengths[s] as u32)?;
                }
                Token::Match {
                    main_symbol,
                    length_symbol,
                    extra_bits,
                    verbatim,
                } => {
                    let s = main_symbol as usize;
                    writer.write_bits(main_codes[s], main_lengths[s] as u32)?;
                    if let Some(symbol) = length_symbol {
                        let l = symbol as usize;
                        writer.write_bits(length_codes[l], length_lengths[l] as u32)?;
                    }
                    writer.write_bits(verbatim, extra_bits as u32)?;
                }
            }
        }

        Ok((writer.finish()?, main_lengths, length_lengths))
    }

    fn write_stored_block(&self, frame: &[u8]) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new(Vec::new());
        self.write_block_header(&mut writer, BlockType::Uncompressed, frame.len())?;
        // The reader always drops 1 to 16 bits here
        if writer.bits_written() % 16 == 0 {
            writer.write_bits(0, 16)?;
        }

        let mut out = writer.finish()?;
        for r in self.repeated {
            out.extend_from_slice(&(r as u32).to_le_bytes());
        }
        out.extend_from_slice(frame);
        if frame.len() % 2 == 1 {
            out.push(0);
        }
        Ok(out)
    }

    fn write_block_header(
        &self,
        writer: &mut BitWriter<Vec<u8>>,
        block_type: BlockType,
        block_len: usize,
    ) -> Result<()> {
        if !self.header_written {
            // No E8 translation
            writer.write_bits(0, 1)?;
        }
        writer.write_bits(block_type.bits(), 3)?;
        writer.write_bits((block_len >> 8) as u32, 16)?;
        writer.write_bits((block_len & 0xFF) as u32, 8)
    }
}

/// Build the token for a match, updating the repeated offsets.
fn match_token(length: usize, distance: usize, repeated: &mut [usize; 3]) -> Token {
    let (slot, extra_bits, verbatim) = if distance == repeated[0] {
        (0, 0, 0)
    } else if distance == repeated[1] {
        repeated.swap(0, 1);
        (1, 0, 0)
    } else if distance == repeated[2] {
        repeated.swap(0, 2);
        (2, 0, 0)
    } else {
        let formatted = (distance + 2) as u32;
        let slot = position_slot(formatted);
        repeated[2] = repeated[1];
        repeated[1] = repeated[0];
        repeated[0] = distance;
        (slot, EXTRA_BITS[slot], formatted - POSITION_BASE[slot])
    };

    let length_header = (length - MIN_MATCH).min(NUM_PRIMARY_LENGTHS);
    let length_symbol = (length_header == NUM_PRIMARY_LENGTHS)
        .then(|| (length - MIN_MATCH - NUM_PRIMARY_LENGTHS) as u8);

    Token::Match {
        main_symbol: (NUM_CHARS + slot * 8 + length_header) as u16,
        length_symbol,
        extra_bits,
        verbatim,
    }
}

/// Send `new` lengths as pretree-coded deltas against `prev`.
fn write_lengths(writer: &mut BitWriter<Vec<u8>>, prev: &[u8], new: &[u8]) -> Result<()> {
    // (pretree symbol, extra bit count, extra value)
    let mut symbols: Vec<(usize, u32, u32)> = Vec::new();

    let mut i = 0;
    while i < new.len() {
        if new[i] == 0 {
            let run = new[i..].iter().take_while(|&&l| l == 0).count();
            if run >= 20 {
                let run = run.min(51);
                symbols.push((18, 5, (run - 20) as u32));
                i += run;
                continue;
            }
            if run >= 4 {
                symbols.push((17, 4, (run - 4) as u32));
                i += run;
                continue;
            }
        }
        let delta = (prev[i] + 17 - new[i]) % 17;
        symbols.push((delta as usize, 0, 0));
        i += 1;
    }

    let mut freq = [0u32; PRETREE_NUM_ELEMENTS];
    for &(symbol, _, _) in &symbols {
        freq[symbol] += 1;
    }
    let pretree_lengths = build_lengths(&freq, PRETREE_MAX_CODE_LENGTH);
    let pretree_codes = canonical_codes(&pretree_lengths);

    for &len in &pretree_lengths {
        writer.write_bits(len as u32, 4)?;
    }
    for &(symbol, extra_count, extra) in &symbols {
        writer.write_bits(pretree_codes[symbol], pretree_lengths[symbol] as u32)?;
        writer.write_bits(extra, extra_count)?;
    }
    Ok(())
}
