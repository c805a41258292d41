//! LZX format constants and position slot tables.

/// Output size of one LZX frame.
pub const FRAME_SIZE: usize = 32768;

/// Shortest match the format can express.
pub const MIN_MATCH: usize = 2;

/// Longest match the format can express.
pub const MAX_MATCH: usize = 257;

/// Number of literal symbols at the start of the main tree.
pub const NUM_CHARS: usize = 256;

/// Match lengths encoded directly in the main symbol (the 8th value escapes
/// to the length tree).
pub const NUM_PRIMARY_LENGTHS: usize = 7;

/// Size of the length tree alphabet.
pub const NUM_SECONDARY_LENGTHS: usize = 249;

/// Size of the pretree alphabet.
pub const PRETREE_NUM_ELEMENTS: usize = 20;

/// Size of the aligned offset tree alphabet.
pub const ALIGNED_NUM_ELEMENTS: usize = 8;

/// Longest code in the main and length trees.
pub const MAX_CODE_LENGTH: u8 = 16;

/// Longest pretree code (lengths are sent in 4 bits).
pub const PRETREE_MAX_CODE_LENGTH: u8 = 15;

/// Smallest supported window exponent.
pub const MIN_WINDOW_BITS: u32 = 15;

/// Largest supported window exponent.
pub const MAX_WINDOW_BITS: u32 = 21;

/// Frames after which E8 translation is no longer applied.
pub const E8_FRAME_LIMIT: u32 = 32768;

/// LZX block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Main + length trees, offsets sent verbatim.
    Verbatim,
    /// As verbatim, with the low 3 offset bits coded by the aligned tree.
    Aligned,
    /// Stored bytes preceded by R0..R2.
    Uncompressed,
}

impl BlockType {
    /// Parse the 3-bit block type field.
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::Verbatim),
            2 => Some(Self::Aligned),
            3 => Some(Self::Uncompressed),
            _ => None,
        }
    }

    /// The 3-bit block type field.
    pub fn bits(self) -> u32 {
        match self {
            Self::Verbatim => 1,
            Self::Aligned => 2,
            Self::Uncompressed => 3,
        }
    }
}

const NUM_SLOT_ENTRIES: usize = 51;

const fn build_extra_bits() -> [u8; NUM_SLOT_ENTRIES] {
    let mut table = [0u8; NUM_SLOT_ENTRIES];
    let mut i = 0;
    let mut bits = 0u8;
    while i < NUM_SLOT_ENTRIES {
        table[i] = bits;
        if i + 1 < NUM_SLOT_ENTRIES {
            table[i + 1] = bits;
        }
        if i != 0 && bits < 17 {
            bits += 1;
        }
        i += 2;
    }
    table
}

const fn build_position_base() -> [u32; NUM_SLOT_ENTRIES] {
    let mut table = [0u32; NUM_SLOT_ENTRIES];
    let mut i = 0;
    let mut base = 0u32;
    while i < NUM_SLOT_ENTRIES {
        table[i] = base;
        base += 1 << EXTRA_BITS[i];
        i += 1;
    }
    table
}

/// Extra (verbatim) bits carried by each position slot.
pub const EXTRA_BITS: [u8; NUM_SLOT_ENTRIES] = build_extra_bits();

/// First formatted offset of each position slot.
pub const POSITION_BASE: [u32; NUM_SLOT_ENTRIES] = build_position_base();

/// Number of position slots for a window exponent, or `None` when the
/// exponent is outside 15..=21.
pub fn position_slots(window_bits: u32) -> Option<usize> {
    match window_bits {
        15 => Some(30),
        16 => Some(32),
        17 => Some(34),
        18 => Some(36),
        19 => Some(38),
        20 => Some(42),
        21 => Some(50),
        _ => None,
    }
}

/// Size of the main tree alphabet for a given number of position slots.
pub fn main_elements(position_slots: usize) -> usize {
    NUM_CHARS + position_slots * 8
}

/// Position slot holding a formatted offset (match distance + 2).
pub fn position_slot(formatted_offset: u32) -> usize {
    POSITION_BASE
        .partition_point(|&base| base <= formatted_offset)
        .saturating_sub(1)
}
