//! Canonical Huffman coding for LZX.
//!
//! LZX codes are canonical: shorter codes come first, and codes of the same
//! length are assigned in increasing symbol order. Because the bitstream is
//! MSB-first, a code can be decoded by accumulating bits and comparing
//! against the first code of each length.
//!
//! Trees must be complete. The only exception is a tree with every length
//! zero, which is accepted but cannot decode anything (an unused length
//! tree is sent this way).

use crate::constants::MAX_CODE_LENGTH;
use hecomp_core::BitReader;
use hecomp_core::error::{HecompError, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const MAX_LEN: usize = MAX_CODE_LENGTH as usize;

/// A canonical Huffman decoding table.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    /// Number of codes of each length.
    counts: [u16; MAX_LEN + 1],
    /// Symbols ordered by (code length, symbol).
    symbols: Vec<u16>,
}

impl HuffmanTable {
    /// A table with no symbols.
    pub fn empty() -> Self {
        Self {
            counts: [0; MAX_LEN + 1],
            symbols: Vec::new(),
        }
    }

    /// Build a table from code lengths.
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        let mut counts = [0u16; MAX_LEN + 1];
        for &len in lengths {
            if len > MAX_CODE_LENGTH {
                return Err(HecompError::invalid_header(format!(
                    "Code length {} exceeds maximum {}",
                    len, MAX_CODE_LENGTH
                )));
            }
            counts[len as usize] += 1;
        }
        counts[0] = 0;

        if counts.iter().all(|&c| c == 0) {
            return Ok(Self::empty());
        }

        // Kraft check: every code must be used exactly once
        let mut left: i32 = 1;
        for &count in &counts[1..] {
            left <<= 1;
            left -= count as i32;
            if left < 0 {
                return Err(HecompError::invalid_header("Over-subscribed Huffman tree"));
            }
        }
        if left > 0 {
            return Err(HecompError::invalid_header("Incomplete Huffman tree"));
        }

        let mut offsets = [0usize; MAX_LEN + 2];
        for len in 1..=MAX_LEN {
            offsets[len + 1] = offsets[len] + counts[len] as usize;
        }

        let mut symbols = vec![0u16; offsets[MAX_LEN + 1]];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len > 0 {
                symbols[offsets[len as usize]] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }

        Ok(Self { counts, symbols })
    }

    /// Check if the table has no symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Decode one symbol.
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        if self.is_empty() {
            return Err(HecompError::invalid_huffman(reader.bit_position()));
        }

        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;

        for len in 1..=MAX_LEN {
            code |= reader.read_bit()? as i32;
            let count = self.counts[len] as i32;
            if code - first < count {
                return Ok(self.symbols[(index + code - first) as usize]);
            }
            index += count;
            first += count;
            first <<= 1;
            code <<= 1;
        }

        Err(HecompError::invalid_huffman(reader.bit_position()))
    }
}

/// Build length-limited code lengths from symbol frequencies.
///
/// The result always describes a complete tree: a single used symbol is
/// paired with a second one so both get length 1. An alphabet with no used
/// symbols yields all-zero lengths.
pub fn build_lengths(frequencies: &[u32], max_length: u8) -> Vec<u8> {
    let mut lengths = vec![0u8; frequencies.len()];

    let used: Vec<usize> = (0..frequencies.len())
        .filter(|&i| frequencies[i] > 0)
        .collect();

    match used.len() {
        0 => return lengths,
        1 => {
            let other = if used[0] == 0 { 1 } else { 0 };
            lengths[used[0]] = 1;
            if other < lengths.len() {
                lengths[other] = 1;
            }
            return lengths;
        }
        _ => {}
    }

    let mut weights: Vec<u64> = used.iter().map(|&i| frequencies[i] as u64).collect();

    loop {
        let depths = huffman_depths(&weights);
        if depths.iter().all(|&d| d <= max_length as u32) {
            for (slot, &symbol) in used.iter().enumerate() {
                lengths[symbol] = depths[slot] as u8;
            }
            return lengths;
        }
        // Flatten the distribution and retry
        for w in weights.iter_mut() {
            *w = (*w + 1) / 2;
        }
    }
}

/// Depth of each leaf in a Huffman tree over `weights` (at least two leaves).
fn huffman_depths(weights: &[u64]) -> Vec<u32> {
    let leaves = weights.len();
    let mut parent = vec![0usize; 2 * leaves - 1];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = weights
        .iter()
        .enumerate()
        .map(|(i, &w)| Reverse((w, i)))
        .collect();

    let mut next = leaves;
    while heap.len() > 1 {
        let (Some(Reverse((w1, a))), Some(Reverse((w2, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        parent[a] = next;
        parent[b] = next;
        heap.push(Reverse((w1 + w2, next)));
        next += 1;
    }

    let root = next - 1;
    let mut depth = vec![0u32; 2 * leaves - 1];
    for node in (0..root).rev() {
        depth[node] = depth[parent[node]] + 1;
    }
    depth.truncate(leaves);
    depth
}

/// Assign canonical codes to code lengths.
pub fn canonical_codes(lengths: &[u8]) -> Vec<u32> {
    let mut bl_count = [0u32; MAX_LEN + 1];
    for &len in lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u32; MAX_LEN + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_LEN {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                0
            } else {
                let c = next_code[len as usize];
                next_code[len as usize] += 1;
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecomp_core::BitWriter;

    fn kraft_complete(lengths: &[u8]) -> bool {
        let sum: u64 = lengths
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 1u64 << (MAX_LEN as u8 - l))
            .sum();
        sum == 1u64 << MAX_LEN
    }

    #[test]
    fn test_decode_simple_tree() {
        // A=0, B=10, C=11
        let lengths = [1u8, 2, 2];
        let table = HuffmanTable::from_lengths(&lengths).unwrap();

        // A B C A -> 0 10 11 0, MSB-first in one word
        let word: u16 = 0b0101_1000_0000_0000;
        let data = word.to_le_bytes();
        let mut reader = BitReader::new(&data);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
        assert_eq!(table.decode(&mut reader).unwrap(), 1);
        assert_eq!(table.decode(&mut reader).unwrap(), 2);
        assert_eq!(table.decode(&mut reader).unwrap(), 0);
    }

    #[test]
    fn test_rejects_bad_trees() {
        assert!(HuffmanTable::from_lengths(&[1, 1, 1]).is_err());
        assert!(HuffmanTable::from_lengths(&[1, 0, 0]).is_err());
        assert!(HuffmanTable::from_lengths(&[17, 1]).is_err());
    }

    #[test]
    fn test_empty_tree() {
        let table = HuffmanTable::from_lengths(&[0; 8]).unwrap();
        assert!(table.is_empty());
        let data = [0u8; 2];
        let mut reader = BitReader::new(&data);
        assert!(table.decode(&mut reader).is_err());
    }

    #[test]
    fn test_build_lengths_single_symbol() {
        let mut freq = vec![0u32; 20];
        freq[7] = 42;
        let lengths = build_lengths(&freq, 15);
        assert_eq!(lengths[7], 1);
        assert_eq!(lengths[0], 1);
        assert!(kraft_complete(&lengths));
    }

    #[test]
    fn test_build_lengths_respects_limit() {
        // Fibonacci frequencies produce a maximally skewed tree
        let mut freq = vec![0u32; 40];
        let (mut a, mut b) = (1u32, 1u32);
        for f in freq.iter_mut() {
            *f = a;
            let n = a.saturating_add(b);
            a = b;
            b = n;
        }
        let lengths = build_lengths(&freq, 16);
        assert!(lengths.iter().all(|&l| (1..=16).contains(&l)));
        assert!(kraft_complete(&lengths));

        let lengths = build_lengths(&freq[..20], 7);
        assert!(lengths.iter().all(|&l| (1..=7).contains(&l)));
        assert!(kraft_complete(&lengths));
    }

    #[test]
    fn test_codes_roundtrip() {
        let freq: Vec<u32> = (0..300u32).map(|i| (i * 7919) % 101 + (i % 3)).collect();
        let lengths = build_lengths(&freq, 16);
        let codes = canonical_codes(&lengths);
        let table = HuffmanTable::from_lengths(&lengths).unwrap();

        let mut writer = BitWriter::new(Vec::new());
        let message: Vec<usize> = (0..300).step_by(7).collect();
        for &s in &message {
            if lengths[s] > 0 {
                writer.write_bits(codes[s], lengths[s] as u32).unwrap();
            }
        }
        let data = writer.finish().unwrap();

        let mut reader = BitReader::new(&data);
        for &s in &message {
            if lengths[s] > 0 {
                assert_eq!(table.decode(&mut reader).unwrap() as usize, s);
            }
        }
    }
}
