//! # hecomp Core
//!
//! Core components shared by the hecomp crates.
//!
//! - [`bitstream`]: LZX bit reader/writer (MSB-first within 16-bit little-endian words)
//! - [`byteorder`]: fixed-width integer access in a chosen byte order
//! - [`stream`]: growable, seekable in-memory byte stream
//! - [`error`]: error types
//!
//! ## Architecture
//!
//! hecomp is layered the same way as a protocol stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L4: CLI                                                 │
//! │     verbs, directory grouping, atomic file replace      │
//! ├─────────────────────────────────────────────────────────┤
//! │ L3: Container                                           │
//! │     signature detection, XCompress, Cabinet             │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     LZX (frames, Huffman trees, micro-frame reader)     │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Core (this crate)                                   │
//! │     BitReader/BitWriter, MemoryStream, ByteOrder        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use hecomp_core::bitstream::{BitReader, BitWriter};
//! use hecomp_core::byteorder::ByteOrder;
//!
//! let mut writer = BitWriter::new(Vec::new());
//! writer.write_bits(0b101, 3).unwrap();
//! let data = writer.finish().unwrap();
//!
//! let mut reader = BitReader::new(&data);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//!
//! assert_eq!(ByteOrder::Big.read_u32(&[0x0F, 0xF5, 0x12, 0xEE]), 0x0FF5_12EE);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod byteorder;
pub mod error;
pub mod stream;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use byteorder::ByteOrder;
pub use error::{HecompError, Result};
pub use stream::MemoryStream;
