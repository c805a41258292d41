//! CAB file header structures.
//!
//! This module defines the on-disk records of a cabinet, all little-endian:
//! - CFHEADER: Main cabinet header
//! - CFFOLDER: Folder compression settings
//! - CFFILE: File metadata
//! - CFDATA: Data block header

use encoding_rs::WINDOWS_1252;
use hecomp_core::{HecompError, Result};
use std::io::{Read, Write};

/// CAB magic number: "MSCF"
pub const MAGIC: [u8; 4] = *b"MSCF";

/// Size of the fixed CFHEADER.
pub const HEADER_SIZE: usize = 36;
/// Size of a CFFOLDER without reserve.
pub const FOLDER_SIZE: usize = 8;
/// Size of a CFFILE before its name.
pub const FILE_FIXED_SIZE: usize = 16;
/// Size of a CFDATA header without reserve.
pub const DATA_HEADER_SIZE: usize = 8;

/// Byte offset of the first folder's data offset (`coffCabStart`).
pub const FIRST_FOLDER_DATA_OFFSET: usize = HEADER_SIZE;
/// Byte offset of the first folder's block count (`cCFData`).
pub const FIRST_FOLDER_BLOCK_COUNT: usize = HEADER_SIZE + 4;

/// Header flag: Previous cabinet present
pub const FLAG_PREV_CABINET: u16 = 0x0001;
/// Header flag: Next cabinet present
pub const FLAG_NEXT_CABINET: u16 = 0x0002;
/// Header flag: Reserve fields present
pub const FLAG_RESERVE_PRESENT: u16 = 0x0004;

/// File attribute: Archive
pub const ATTR_ARCHIVE: u16 = 0x20;
/// File attribute: UTF-8 name encoding
pub const ATTR_NAME_IS_UTF: u16 = 0x80;

/// Compression type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    /// No compression (stored)
    None,
    /// MSZIP (Deflate-based)
    MsZip,
    /// Quantum compression
    Quantum,
    /// LZX compression with window exponent
    Lzx(u8),
    /// Unrecognized method number
    Unknown(u16),
}

impl CompressionType {
    /// Parse compression type from u16 value.
    pub fn from_u16(value: u16) -> Self {
        let method = value & 0x000F;
        let param = ((value >> 8) & 0x1F) as u8;

        match method {
            0 => CompressionType::None,
            1 => CompressionType::MsZip,
            2 => CompressionType::Quantum,
            3 => CompressionType::Lzx(param),
            _ => CompressionType::Unknown(value),
        }
    }

    /// The `typeCompress` field value.
    pub fn to_u16(self) -> u16 {
        match self {
            CompressionType::None => 0,
            CompressionType::MsZip => 1,
            CompressionType::Quantum => 2,
            CompressionType::Lzx(bits) => 3 | ((bits as u16 & 0x1F) << 8),
            CompressionType::Unknown(value) => value,
        }
    }
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "stored"),
            Self::MsZip => write!(f, "MSZIP"),
            Self::Quantum => write!(f, "Quantum"),
            Self::Lzx(bits) => write!(f, "LZX (window 2^{})", bits),
            Self::Unknown(value) => write!(f, "unknown ({:#06x})", value),
        }
    }
}

/// CFHEADER - Cabinet file header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CabHeader {
    /// Total cabinet file size
    pub cabinet_size: u32,
    /// Offset of first CFFILE entry
    pub files_offset: u32,
    /// Format version (minor)
    pub version_minor: u8,
    /// Format version (major)
    pub version_major: u8,
    /// Number of folder entries
    pub num_folders: u16,
    /// Number of file entries
    pub num_files: u16,
    /// Header flags
    pub flags: u16,
    /// Set identifier
    pub set_id: u16,
    /// Cabinet index in set
    pub cabinet_index: u16,
    /// Size of per-cabinet reserved area
    pub header_reserve_size: u16,
    /// Size of per-folder reserved area
    pub folder_reserve_size: u8,
    /// Size of per-data reserved area
    pub data_reserve_size: u8,
}

impl CabHeader {
    /// Read a CFHEADER from the input.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut buf)?;

        if buf[0..4] != MAGIC {
            return Err(HecompError::invalid_magic(MAGIC.to_vec(), buf[0..4].to_vec()));
        }

        let cabinet_size = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let files_offset = u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]);
        let version_minor = buf[24];
        let version_major = buf[25];
        let num_folders = u16::from_le_bytes([buf[26], buf[27]]);
        let num_files = u16::from_le_bytes([buf[28], buf[29]]);
        let flags = u16::from_le_bytes([buf[30], buf[31]]);
        let set_id = u16::from_le_bytes([buf[32], buf[33]]);
        let cabinet_index = u16::from_le_bytes([buf[34], buf[35]]);

        let (header_reserve_size, folder_reserve_size, data_reserve_size) =
            if flags & FLAG_RESERVE_PRESENT != 0 {
                let mut reserve_buf = [0u8; 4];
                reader.read_exact(&mut reserve_buf)?;
                (
                    u16::from_le_bytes([reserve_buf[0], reserve_buf[1]]),
                    reserve_buf[2],
                    reserve_buf[3],
                )
            } else {
                (0, 0, 0)
            };

        if header_reserve_size > 0 {
            skip(reader, header_reserve_size as usize)?;
        }

        // Spanning names are not kept; only single cabinets are extracted
        if flags & FLAG_PREV_CABINET != 0 {
            read_null_bytes(reader)?;
            read_null_bytes(reader)?;
        }
        if flags & FLAG_NEXT_CABINET != 0 {
            read_null_bytes(reader)?;
            read_null_bytes(reader)?;
        }

        Ok(Self {
            cabinet_size,
            files_offset,
            version_minor,
            version_major,
            num_folders,
            num_files,
            flags,
            set_id,
            cabinet_index,
            header_reserve_size,
            folder_reserve_size,
            data_reserve_size,
        })
    }

    /// Write a CFHEADER without reserve or spanning fields.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[8..12].copy_from_slice(&self.cabinet_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.files_offset.to_le_bytes());
        buf[24] = self.version_minor;
        buf[25] = self.version_major;
        buf[26..28].copy_from_slice(&self.num_folders.to_le_bytes());
        buf[28..30].copy_from_slice(&self.num_files.to_le_bytes());
        buf[30..32].copy_from_slice(&self.flags.to_le_bytes());
        buf[32..34].copy_from_slice(&self.set_id.to_le_bytes());
        buf[34..36].copy_from_slice(&self.cabinet_index.to_le_bytes());
        writer.write_all(&buf)?;
        Ok(())
    }
}

/// CFFOLDER - Folder entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabFolder {
    /// Offset of first CFDATA block
    pub data_offset: u32,
    /// Number of CFDATA blocks
    pub num_data_blocks: u16,
    /// Compression type
    pub compression_type: CompressionType,
}

impl CabFolder {
    /// Read a CFFOLDER from the input.
    pub fn read<R: Read>(reader: &mut R, reserve_size: u8) -> Result<Self> {
        let mut buf = [0u8; FOLDER_SIZE];
        reader.read_exact(&mut buf)?;

        let data_offset = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let num_data_blocks = u16::from_le_bytes([buf[4], buf[5]]);
        let type_compress = u16::from_le_bytes([buf[6], buf[7]]);

        if reserve_size > 0 {
            skip(reader, reserve_size as usize)?;
        }

        Ok(Self {
            data_offset,
            num_data_blocks,
            compression_type: CompressionType::from_u16(type_compress),
        })
    }

    /// Write a CFFOLDER without reserve.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data_offset.to_le_bytes())?;
        writer.write_all(&self.num_data_blocks.to_le_bytes())?;
        writer.write_all(&self.compression_type.to_u16().to_le_bytes())?;
        Ok(())
    }
}

/// CFFILE - File entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabFile {
    /// Uncompressed file size
    pub uncompressed_size: u32,
    /// Offset within uncompressed folder
    pub folder_offset: u32,
    /// Folder index
    pub folder_index: u16,
    /// DOS date
    pub date: u16,
    /// DOS time
    pub time: u16,
    /// File attributes
    pub attributes: u16,
    /// Filename
    pub name: String,
}

impl CabFile {
    /// Read a CFFILE from the input.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; FILE_FIXED_SIZE];
        reader.read_exact(&mut buf)?;

        let uncompressed_size = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let folder_offset = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let folder_index = u16::from_le_bytes([buf[8], buf[9]]);
        let date = u16::from_le_bytes([buf[10], buf[11]]);
        let time = u16::from_le_bytes([buf[12], buf[13]]);
        let attributes = u16::from_le_bytes([buf[14], buf[15]]);

        let name_bytes = read_null_bytes(reader)?;

        // UTF-8 if flagged, otherwise the Windows code page
        let name = if attributes & ATTR_NAME_IS_UTF != 0 {
            String::from_utf8_lossy(&name_bytes).into_owned()
        } else {
            let (decoded, _, _) = WINDOWS_1252.decode(&name_bytes);
            decoded.into_owned()
        };

        Ok(Self {
            uncompressed_size,
            folder_offset,
            folder_index,
            date,
            time,
            attributes,
            name,
        })
    }

    /// Write a CFFILE. Names outside ASCII are stored as UTF-8 and flagged.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut attributes = self.attributes;
        if !self.name.is_ascii() {
            attributes |= ATTR_NAME_IS_UTF;
        }

        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&self.folder_offset.to_le_bytes())?;
        writer.write_all(&self.folder_index.to_le_bytes())?;
        writer.write_all(&self.date.to_le_bytes())?;
        writer.write_all(&self.time.to_le_bytes())?;
        writer.write_all(&attributes.to_le_bytes())?;
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(&[0])?;
        Ok(())
    }

    /// Size of this record on disk.
    pub fn encoded_len(&self) -> usize {
        FILE_FIXED_SIZE + self.name.len() + 1
    }
}

/// CFDATA - Data block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfData {
    /// Block checksum, zero when absent
    pub checksum: u32,
    /// Compressed bytes that follow
    pub compressed_size: u16,
    /// Decoded size of the block
    pub uncompressed_size: u16,
}

impl CfData {
    /// Read a CFDATA header from the input.
    pub fn read<R: Read>(reader: &mut R, reserve_size: u8) -> Result<Self> {
        let mut buf = [0u8; DATA_HEADER_SIZE];
        reader.read_exact(&mut buf)?;

        let checksum = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let compressed_size = u16::from_le_bytes([buf[4], buf[5]]);
        let uncompressed_size = u16::from_le_bytes([buf[6], buf[7]]);

        if reserve_size > 0 {
            skip(reader, reserve_size as usize)?;
        }

        Ok(Self {
            checksum,
            compressed_size,
            uncompressed_size,
        })
    }

    /// Build a header for `data`, with its checksum.
    pub fn for_block(data: &[u8], uncompressed_size: u16) -> Result<Self> {
        let compressed_size = u16::try_from(data.len()).map_err(|_| {
            HecompError::corrupted(0, format!("Data block of {} bytes is too large", data.len()))
        })?;
        let mut block = Self {
            checksum: 0,
            compressed_size,
            uncompressed_size,
        };
        block.checksum = block.compute_checksum(data);
        Ok(block)
    }

    /// Checksum over the block data and the two size fields.
    pub fn compute_checksum(&self, data: &[u8]) -> u32 {
        let mut sizes = [0u8; 4];
        sizes[0..2].copy_from_slice(&self.compressed_size.to_le_bytes());
        sizes[2..4].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        checksum(&sizes, checksum(data, 0))
    }

    /// Verify a stored checksum. A zero checksum is not checked.
    pub fn verify(&self, data: &[u8]) -> Result<()> {
        if self.checksum == 0 {
            return Ok(());
        }
        let computed = self.compute_checksum(data);
        if computed != self.checksum {
            return Err(HecompError::checksum_mismatch(self.checksum, computed));
        }
        Ok(())
    }

    /// Write the header.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.checksum.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        Ok(())
    }
}

/// Cabinet checksum: XOR of little-endian words, leftover bytes packed
/// most significant first.
pub fn checksum(data: &[u8], seed: u32) -> u32 {
    let mut csum = seed;
    let mut words = data.chunks_exact(4);
    for word in &mut words {
        csum ^= u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
    }

    let tail = words
        .remainder()
        .iter()
        .fold(0u32, |acc, &byte| (acc << 8) | byte as u32);
    csum ^ tail
}

fn skip<R: Read>(reader: &mut R, count: usize) -> Result<()> {
    let mut buf = vec![0u8; count];
    reader.read_exact(&mut buf)?;
    Ok(())
}

/// Read null-terminated bytes.
fn read_null_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut buf = [0u8; 1];

    loop {
        reader.read_exact(&mut buf)?;
        if buf[0] == 0 {
            break;
        }
        bytes.push(buf[0]);
    }

    Ok(bytes)
}
