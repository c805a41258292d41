//! # hecomp Archive
//!
//! Container formats for hecomp.
//!
//! - **XCompress**: fixed 48-byte header followed by length-prefixed blocks
//!   of micro-framed LZX, in a big-endian and a little-endian variant
//! - **CAB**: Microsoft Cabinet archives with stored or LZX folders
//!
//! ## Example
//!
//! ```rust
//! use hecomp_archive::detect::Signature;
//! use hecomp_archive::xcompress;
//!
//! let packed = xcompress::compress(&[1, 2, 3], "asset.bin").unwrap();
//! assert!(Signature::from_bytes(&packed).is_compressed());
//! assert_eq!(xcompress::decompress(&packed).unwrap(), [1, 2, 3]);
//! ```
//!
//! ## Format Detection
//!
//! Use [`detect::Signature`] to classify a file by its first four bytes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cab;
pub mod detect;
pub mod xcompress;

// Re-exports
pub use cab::{CabBlockTable, CabReader, CabWriter};
pub use detect::Signature;
pub use xcompress::XCompressHeader;

use hecomp_core::Result;

/// Decode a buffer according to its signature.
///
/// Returns `Ok(None)` when the buffer is not in a compressed form.
pub fn decompress(input: &[u8]) -> Result<Option<Vec<u8>>> {
    match Signature::from_bytes(input) {
        Signature::Raw => Ok(None),
        Signature::XCompress(_) => xcompress::decompress(input).map(Some),
        Signature::Cabinet => cab::decompress(input).map(Some),
    }
}
