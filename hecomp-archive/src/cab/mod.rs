//! Microsoft Cabinet (CAB) archive support.
//!
//! Cabinets are used here as an intermediate for XCompress: the LZX
//! chunks of a single-folder cabinet are exactly the payload an
//! XCompress block carries, so compression builds a cabinet and then
//! walks its data blocks with [`CabBlockTable`].
//!
//! ## Format Overview
//!
//! Cabinet files consist of:
//! - CFHEADER: Main header with file metadata
//! - CFFOLDER[]: Folder entries describing compression settings
//! - CFFILE[]: File entries with names and attributes
//! - CFDATA[]: Compressed data blocks
//!
//! ## Compression Methods
//!
//! - None (stored): No compression
//! - MSZIP: read, with 32 KiB history carried across blocks
//! - LZX: read and written, windows 2^15 to 2^21
//! - Quantum: not supported
//!
//! ## Example
//!
//! ```rust
//! use hecomp_archive::cab;
//!
//! let data = b"cabinet payload, cabinet payload".to_vec();
//! let cabinet = cab::compress(&data, "payload.bin", 17).unwrap();
//! assert_eq!(&cabinet[..4], b"MSCF");
//! assert_eq!(cab::decompress(&cabinet).unwrap(), data);
//! ```

pub mod header;
pub mod mszip;
pub mod storage;
mod writer;

pub use header::{CabFile, CabFolder, CabHeader, CfData, CompressionType};
pub use writer::CabWriter;

use header::{DATA_HEADER_SIZE, FIRST_FOLDER_BLOCK_COUNT, FIRST_FOLDER_DATA_OFFSET, MAGIC};
use hecomp_core::{HecompError, MemoryStream, Result};
use hecomp_lzx::LzxDecoder;
use mszip::MsZipDecoder;
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

/// LZX window exponent used when building cabinets.
pub const DEFAULT_WINDOW_BITS: u32 = 17;

/// Decoder state for the folder being read.
enum FolderDecoder {
    Stored,
    MsZip(MsZipDecoder),
    Lzx(LzxDecoder),
}

/// Cabinet archive reader.
pub struct CabReader<R> {
    reader: R,
    header: CabHeader,
    folders: Vec<CabFolder>,
    files: Vec<CabFile>,
}

impl<R: Read + Seek> CabReader<R> {
    /// Create a new CAB reader from the given input.
    pub fn new(mut reader: R) -> Result<Self> {
        let header = CabHeader::read(&mut reader)?;

        let mut folders = Vec::with_capacity(header.num_folders as usize);
        for _ in 0..header.num_folders {
            folders.push(CabFolder::read(&mut reader, header.folder_reserve_size)?);
        }

        reader.seek(SeekFrom::Start(header.files_offset as u64))?;

        let mut files = Vec::with_capacity(header.num_files as usize);
        for _ in 0..header.num_files {
            files.push(CabFile::read(&mut reader)?);
        }

        Ok(Self {
            reader,
            header,
            folders,
            files,
        })
    }

    /// File entries, in cabinet order.
    pub fn files(&self) -> &[CabFile] {
        &self.files
    }

    /// Folder entries.
    pub fn folders(&self) -> &[CabFolder] {
        &self.folders
    }

    /// Get the cabinet version.
    pub fn version(&self) -> (u8, u8) {
        (self.header.version_major, self.header.version_minor)
    }

    /// Get the total cabinet size.
    pub fn cabinet_size(&self) -> u32 {
        self.header.cabinet_size
    }

    /// Get the number of folders.
    pub fn num_folders(&self) -> u16 {
        self.header.num_folders
    }

    /// Get the number of files.
    pub fn num_files(&self) -> u16 {
        self.header.num_files
    }

    /// Extract a file by index.
    pub fn extract_by_index(&mut self, index: usize) -> Result<Vec<u8>> {
        let file = self
            .files
            .get(index)
            .cloned()
            .ok_or_else(|| HecompError::corrupted(0, format!("File index {} out of range", index)))?;
        let folder_data = self.decompress_folder(self.folder_index(&file)?)?;
        Ok(file_slice(&folder_data, &file)?.to_vec())
    }

    /// Extract every file and concatenate them in cabinet order.
    pub fn extract_all(&mut self) -> Result<Vec<u8>> {
        let files = self.files.clone();
        let mut cache: Vec<Option<Vec<u8>>> = vec![None; self.folders.len()];
        let mut output = Vec::new();

        for file in &files {
            let idx = self.folder_index(file)?;
            if cache[idx].is_none() {
                cache[idx] = Some(self.decompress_folder(idx)?);
            }
            if let Some(folder_data) = &cache[idx] {
                output.extend_from_slice(file_slice(folder_data, file)?);
            }
        }

        Ok(output)
    }

    fn folder_index(&self, file: &CabFile) -> Result<usize> {
        // 0xFFFD..=0xFFFF mark files continued from or into another cabinet
        if file.folder_index >= 0xFFFD {
            return Err(HecompError::unsupported_method("Multi-cabinet spanning"));
        }

        let folder_idx = file.folder_index as usize;
        if folder_idx >= self.folders.len() {
            return Err(HecompError::corrupted(
                0,
                format!("Invalid folder index: {}", folder_idx),
            ));
        }
        Ok(folder_idx)
    }

    /// Decompress all data blocks in a folder.
    fn decompress_folder(&mut self, folder_idx: usize) -> Result<Vec<u8>> {
        let folder = self.folders[folder_idx].clone();

        let mut decoder = match folder.compression_type {
            CompressionType::None => FolderDecoder::Stored,
            CompressionType::MsZip => FolderDecoder::MsZip(MsZipDecoder::new()),
            CompressionType::Lzx(bits) => FolderDecoder::Lzx(LzxDecoder::new(bits as u32)?),
            other => {
                return Err(HecompError::unsupported_method(format!(
                    "{} compression",
                    other
                )));
            }
        };

        self.reader
            .seek(SeekFrom::Start(folder.data_offset as u64))?;

        let mut output = Vec::new();

        for _ in 0..folder.num_data_blocks {
            let block = CfData::read(&mut self.reader, self.header.data_reserve_size)?;
            let mut data = vec![0u8; block.compressed_size as usize];
            self.reader.read_exact(&mut data)?;
            block.verify(&data)?;

            match &mut decoder {
                FolderDecoder::Lzx(lzx) => {
                    let frame = lzx.decompress_frame(&data, block.uncompressed_size as usize)?;
                    output.extend_from_slice(&frame);
                }
                FolderDecoder::MsZip(inflater) => {
                    let frame = inflater.decompress_block(&data, block.uncompressed_size as usize)?;
                    output.extend_from_slice(&frame);
                }
                FolderDecoder::Stored => {
                    if block.compressed_size != block.uncompressed_size {
                        return Err(HecompError::corrupted(
                            self.reader.stream_position()?,
                            format!(
                                "Stored block size mismatch: {} != {}",
                                block.compressed_size, block.uncompressed_size
                            ),
                        ));
                    }
                    output.extend_from_slice(&data);
                }
            }
        }

        debug!(
            folder = folder_idx,
            blocks = folder.num_data_blocks,
            bytes = output.len(),
            "decompressed cabinet folder"
        );

        Ok(output)
    }
}

fn file_slice<'a>(folder_data: &'a [u8], file: &CabFile) -> Result<&'a [u8]> {
    let start = file.folder_offset as usize;
    let end = start + file.uncompressed_size as usize;

    folder_data.get(start..end).ok_or_else(|| {
        HecompError::corrupted(
            0,
            format!(
                "File extends beyond folder data: {} > {}",
                end,
                folder_data.len()
            ),
        )
    })
}

/// One CFDATA record as found in the cabinet bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CabBlock<'a> {
    /// Stored checksum
    pub checksum: u32,
    /// Decoded size of the block
    pub uncompressed_size: u16,
    /// Compressed bytes
    pub data: &'a [u8],
}

/// The data blocks of a cabinet's first folder, located by offset.
///
/// Only the fields at 0x24 (`coffCabStart`) and 0x28 (`cCFData`) are
/// consulted; records are assumed to carry no reserve area.
#[derive(Debug, Clone)]
pub struct CabBlockTable<'a> {
    blocks: Vec<CabBlock<'a>>,
}

impl<'a> CabBlockTable<'a> {
    /// Locate every data block of the first folder.
    pub fn parse(cabinet: &'a [u8]) -> Result<Self> {
        if cabinet.len() < FIRST_FOLDER_BLOCK_COUNT + 2 {
            return Err(HecompError::invalid_header(format!(
                "Cabinet of {} bytes is too short",
                cabinet.len()
            )));
        }
        if cabinet[..4] != MAGIC {
            return Err(HecompError::invalid_magic(MAGIC.to_vec(), cabinet[..4].to_vec()));
        }

        let at = FIRST_FOLDER_DATA_OFFSET;
        let offset = u32::from_le_bytes([
            cabinet[at],
            cabinet[at + 1],
            cabinet[at + 2],
            cabinet[at + 3],
        ]) as usize;
        let at = FIRST_FOLDER_BLOCK_COUNT;
        let count = u16::from_le_bytes([cabinet[at], cabinet[at + 1]]) as usize;

        let mut blocks = Vec::with_capacity(count);
        let mut pos = offset;
        for index in 0..count {
            let record = pos
                .checked_add(DATA_HEADER_SIZE)
                .and_then(|end| cabinet.get(pos..end))
                .ok_or_else(|| {
                    HecompError::corrupted(
                        pos as u64,
                        format!("Data block {} header runs past end of cabinet", index),
                    )
                })?;
            let checksum = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
            let compressed_size = u16::from_le_bytes([record[4], record[5]]) as usize;
            let uncompressed_size = u16::from_le_bytes([record[6], record[7]]);
            pos += DATA_HEADER_SIZE;

            let data = cabinet.get(pos..pos + compressed_size).ok_or_else(|| {
                HecompError::corrupted(
                    pos as u64,
                    format!("Data block {} runs past end of cabinet", index),
                )
            })?;
            pos += compressed_size;

            blocks.push(CabBlock {
                checksum,
                uncompressed_size,
                data,
            });
        }

        Ok(Self { blocks })
    }

    /// The blocks, in folder order.
    pub fn blocks(&self) -> &[CabBlock<'a>] {
        &self.blocks
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the folder holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Sum of the decoded block sizes.
    pub fn uncompressed_total(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| block.uncompressed_size as u64)
            .sum()
    }
}

/// Build a single-file LZX cabinet around `data`.
pub fn compress(data: &[u8], name: &str, window_bits: u32) -> Result<Vec<u8>> {
    let mut writer = CabWriter::new(window_bits)?;
    writer.add_file(name, data)?;
    writer.finish()
}

/// Extract every file of a cabinet, concatenated in cabinet order.
pub fn decompress(cabinet: &[u8]) -> Result<Vec<u8>> {
    let mut reader = CabReader::new(MemoryStream::from_vec(cabinet.to_vec()))?;
    reader.extract_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hecomp_lzx::FRAME_SIZE;

    fn sample(len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| b"the quick brown fox "[i % 20] ^ (i / 4096) as u8)
            .collect()
    }

    #[test]
    fn test_cab_magic() {
        assert_eq!(header::MAGIC, *b"MSCF");
    }

    #[test]
    fn test_roundtrip_single_file() {
        let data = sample(FRAME_SIZE * 3 + 123);
        let cabinet = compress(&data, "sample.bin", DEFAULT_WINDOW_BITS).unwrap();
        assert!(cabinet.len() < data.len());
        assert_eq!(decompress(&cabinet).unwrap(), data);
    }

    #[test]
    fn test_reader_metadata() {
        let cabinet = compress(b"abc", "tiny.bin", 15).unwrap();
        let mut reader = CabReader::new(MemoryStream::from_vec(cabinet.clone())).unwrap();

        assert_eq!(reader.version(), (1, 3));
        assert_eq!(reader.cabinet_size() as usize, cabinet.len());
        assert_eq!(reader.num_folders(), 1);
        assert_eq!(reader.num_files(), 1);
        assert_eq!(reader.files()[0].name, "tiny.bin");
        assert_eq!(reader.files()[0].uncompressed_size, 3);
        assert_eq!(reader.folders()[0].compression_type, CompressionType::Lzx(15));
        assert_eq!(reader.extract_by_index(0).unwrap(), b"abc");
        assert!(reader.extract_by_index(1).is_err());
    }

    #[test]
    fn test_multiple_files_concatenate() {
        let mut writer = CabWriter::new(16).unwrap();
        writer.add_file("one", b"first file;").unwrap();
        writer.add_file("two", &sample(40_000)).unwrap();
        let cabinet = writer.finish().unwrap();

        let mut reader = CabReader::new(MemoryStream::from_vec(cabinet.clone())).unwrap();
        assert_eq!(reader.extract_by_index(1).unwrap(), sample(40_000));

        let mut expected = b"first file;".to_vec();
        expected.extend(sample(40_000));
        assert_eq!(decompress(&cabinet).unwrap(), expected);
    }

    #[test]
    fn test_corrupted_checksum() {
        let mut cabinet = compress(&sample(1000), "x", 17).unwrap();
        let last = cabinet.len() - 1;
        cabinet[last] ^= 0x55;
        assert!(decompress(&cabinet).is_err());
    }

    /// Single-folder, single-file cabinet around ready-made data blocks.
    fn single_folder_cabinet(
        compression_type: CompressionType,
        blocks: &[(Vec<u8>, u16)],
    ) -> Vec<u8> {
        let file = CabFile {
            uncompressed_size: blocks.iter().map(|(_, size)| *size as u32).sum(),
            folder_offset: 0,
            folder_index: 0,
            date: 0x0021,
            time: 0,
            attributes: header::ATTR_ARCHIVE,
            name: "h".to_string(),
        };
        let data_offset = (header::HEADER_SIZE + header::FOLDER_SIZE + file.encoded_len()) as u32;
        let data_len: usize = blocks.iter().map(|(data, _)| DATA_HEADER_SIZE + data.len()).sum();
        let header = CabHeader {
            cabinet_size: data_offset + data_len as u32,
            files_offset: (header::HEADER_SIZE + header::FOLDER_SIZE) as u32,
            version_minor: 3,
            version_major: 1,
            num_folders: 1,
            num_files: 1,
            ..Default::default()
        };
        let folder = CabFolder {
            data_offset,
            num_data_blocks: blocks.len() as u16,
            compression_type,
        };

        let mut cabinet = Vec::new();
        header.write(&mut cabinet).unwrap();
        folder.write(&mut cabinet).unwrap();
        file.write(&mut cabinet).unwrap();
        for (data, uncompressed_size) in blocks {
            CfData::for_block(data, *uncompressed_size)
                .unwrap()
                .write(&mut cabinet)
                .unwrap();
            cabinet.extend_from_slice(data);
        }
        cabinet
    }

    #[test]
    fn test_stored_folder() {
        let cabinet = single_folder_cabinet(CompressionType::None, &[(b"hello".to_vec(), 5)]);
        assert_eq!(decompress(&cabinet).unwrap(), b"hello");
    }

    #[test]
    fn test_mszip_folder() {
        use flate2::{Compress, Compression, FlushCompress};

        let data = sample(FRAME_SIZE * 2 + 777);
        let blocks: Vec<(Vec<u8>, u16)> = data
            .chunks(FRAME_SIZE)
            .map(|chunk| {
                let mut block = mszip::SIGNATURE.to_vec();
                block.reserve(chunk.len() + 1024);
                Compress::new(Compression::default(), false)
                    .compress_vec(chunk, &mut block, FlushCompress::Finish)
                    .unwrap();
                (block, chunk.len() as u16)
            })
            .collect();
        let cabinet = single_folder_cabinet(CompressionType::MsZip, &blocks);

        let mut reader = CabReader::new(MemoryStream::from_vec(cabinet.clone())).unwrap();
        assert_eq!(reader.folders()[0].compression_type, CompressionType::MsZip);
        assert_eq!(reader.extract_by_index(0).unwrap(), data);
        assert_eq!(decompress(&cabinet).unwrap(), data);
    }

    #[test]
    fn test_mszip_bad_signature() {
        let block = (b"ZZ\x03\x00".to_vec(), 0);
        let cabinet = single_folder_cabinet(CompressionType::MsZip, &[block]);
        assert!(matches!(
            decompress(&cabinet),
            Err(HecompError::CorruptedData { .. })
        ));
    }

    #[test]
    fn test_unsupported_method() {
        for method in [2u16, 7] {
            let mut cabinet = compress(b"abc", "x", 17).unwrap();
            // typeCompress of the first folder -> Quantum, then an unknown method
            cabinet[42..44].copy_from_slice(&method.to_le_bytes());
            assert!(matches!(
                decompress(&cabinet),
                Err(HecompError::UnsupportedMethod { .. })
            ));
        }
    }

    #[test]
    fn test_block_table() {
        let data = sample(FRAME_SIZE * 2 + 5);
        let cabinet = compress(&data, "t", 17).unwrap();
        let table = CabBlockTable::parse(&cabinet).unwrap();

        assert_eq!(table.len(), 3);
        assert!(!table.is_empty());
        assert_eq!(table.uncompressed_total(), data.len() as u64);
        assert_eq!(table.blocks()[0].uncompressed_size as usize, FRAME_SIZE);
        assert_eq!(table.blocks()[2].uncompressed_size, 5);

        for block in table.blocks() {
            let header = CfData::for_block(block.data, block.uncompressed_size).unwrap();
            assert_eq!(header.checksum, block.checksum);
        }

        let last = table.blocks()[2];
        let end = last.data.as_ptr() as usize + last.data.len() - cabinet.as_ptr() as usize;
        assert_eq!(end, cabinet.len());
    }

    #[test]
    fn test_block_table_bounds() {
        let cabinet = compress(&sample(5000), "t", 17).unwrap();
        assert!(CabBlockTable::parse(&cabinet[..cabinet.len() - 1]).is_err());
        assert!(CabBlockTable::parse(&cabinet[..20]).is_err());
        assert!(CabBlockTable::parse(b"not a cabinet at all, not a cabinet at all").is_err());
    }
}
