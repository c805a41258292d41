//! Container format detection.
//!
//! Only the first four bytes of a file are consulted. They are read as a
//! little-endian word and compared, directly and byte-swapped, against the
//! XCompress and Cabinet magic numbers. Extension and size play no part.
//!
//! XCompress files come in two byte orders. The canonical form starts with
//! the bytes `0F F5 12 EE` and stores every header field big-endian; a file
//! starting with `EE 12 F5 0F` stores the same fields little-endian.

use hecomp_core::ByteOrder;
use std::fmt;

/// XCompress magic number.
pub const XCOMPRESS_MAGIC: u32 = 0x0FF5_12EE;

/// Cabinet magic number ("MSCF" read as a little-endian word).
pub const CABINET_MAGIC: u32 = 0x4643_534D;

/// Leading word of an XCompress file whose header is big-endian.
pub const XCOMPRESS_BE_MARKER: u32 = 0xEE12_F50F;

/// What a file's leading bytes say it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signature {
    /// Not a recognized compressed container.
    Raw,
    /// XCompress container with header fields in the given byte order.
    XCompress(ByteOrder),
    /// Cabinet archive.
    Cabinet,
}

impl Signature {
    /// Classify a leading word read little-endian from the file.
    pub fn from_word(word: u32) -> Self {
        if word == CABINET_MAGIC {
            Self::Cabinet
        } else if word == XCOMPRESS_BE_MARKER || word.swap_bytes() == XCOMPRESS_MAGIC {
            Self::XCompress(ByteOrder::Big)
        } else if word == XCOMPRESS_MAGIC {
            Self::XCompress(ByteOrder::Little)
        } else {
            Self::Raw
        }
    }

    /// Classify the start of a file. Inputs shorter than four bytes are raw.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes.get(..4) {
            Some(head) => Self::from_word(ByteOrder::Little.read_u32(head)),
            None => Self::Raw,
        }
    }

    /// Check if the file is already in a compressed form.
    pub fn is_compressed(self) -> bool {
        !matches!(self, Self::Raw)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "Raw"),
            Self::XCompress(order) => write!(f, "XCompress ({})", order),
            Self::Cabinet => write!(f, "Cabinet"),
        }
    }
}
