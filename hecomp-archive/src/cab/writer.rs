//! Single-folder LZX cabinet writer.

use super::header::{
    ATTR_ARCHIVE, CabFile, CabFolder, CabHeader, CfData, CompressionType, FOLDER_SIZE, HEADER_SIZE,
};
use super::storage::{Handle, HandleTable};
use hecomp_core::{HecompError, MemoryStream, Result};
use hecomp_lzx::{FRAME_SIZE, LzxEncoder, MAX_WINDOW_BITS, MIN_WINDOW_BITS};
use std::io::SeekFrom;
use tracing::debug;

/// DOS date for 1980-01-01.
const DOS_EPOCH_DATE: u16 = 0x0021;

#[derive(Debug)]
struct PendingFile {
    name: String,
    handle: Handle,
}

/// Cabinet writer.
///
/// Files are concatenated into one LZX folder, in the order they were
/// added, and cut into 32768-byte CFDATA blocks.
#[derive(Debug)]
pub struct CabWriter {
    table: HandleTable,
    window_bits: u32,
    files: Vec<PendingFile>,
}

impl CabWriter {
    /// Create a writer using an LZX window of `2^window_bits` bytes.
    pub fn new(window_bits: u32) -> Result<Self> {
        if !(MIN_WINDOW_BITS..=MAX_WINDOW_BITS).contains(&window_bits) {
            return Err(HecompError::invalid_window_size(window_bits));
        }
        Ok(Self {
            table: HandleTable::new(),
            window_bits,
            files: Vec::new(),
        })
    }

    /// Add a file to the cabinet.
    pub fn add_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(HecompError::invalid_header("Cabinet file name is empty"));
        }
        if u32::try_from(data.len()).is_err() {
            return Err(HecompError::input_too_large(
                data.len() as u64,
                u32::MAX as u64,
            ));
        }

        let handle = self.table.insert(MemoryStream::from_vec(data.to_vec()));
        self.files.push(PendingFile {
            name: name.to_string(),
            handle,
        });
        Ok(())
    }

    /// Compress all files and return the cabinet bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let data_handle = self.table.create();
        let files_handle = self.table.create();

        let mut encoder = LzxEncoder::new(self.window_bits)?;
        let mut frame = Vec::with_capacity(FRAME_SIZE);
        let mut block_count: usize = 0;
        let mut folder_offset: u64 = 0;
        let mut entries = Vec::with_capacity(self.files.len());

        for file in std::mem::take(&mut self.files) {
            let size = self.table.get(file.handle)?.len();
            entries.push(CabFile {
                uncompressed_size: size as u32,
                folder_offset: to_u32(folder_offset)?,
                folder_index: 0,
                date: DOS_EPOCH_DATE,
                time: 0,
                attributes: ATTR_ARCHIVE,
                name: file.name,
            });
            folder_offset += size as u64;

            self.table.seek(file.handle, SeekFrom::Start(0))?;
            let mut buf = vec![0u8; FRAME_SIZE];
            loop {
                let want = FRAME_SIZE - frame.len();
                let n = self.table.read(file.handle, &mut buf[..want])?;
                if n == 0 {
                    break;
                }
                frame.extend_from_slice(&buf[..n]);
                if frame.len() == FRAME_SIZE {
                    self.write_block(&mut encoder, &frame, data_handle)?;
                    block_count += 1;
                    frame.clear();
                }
            }
            self.table.remove(file.handle)?;
        }
        if !frame.is_empty() {
            self.write_block(&mut encoder, &frame, data_handle)?;
            block_count += 1;
        }

        let num_data_blocks = u16::try_from(block_count).map_err(|_| {
            HecompError::input_too_large(folder_offset, u16::MAX as u64 * FRAME_SIZE as u64)
        })?;
        let num_files = u16::try_from(entries.len()).map_err(|_| {
            HecompError::invalid_header(format!("Too many files for one cabinet: {}", entries.len()))
        })?;

        for entry in &entries {
            entry.write(self.table.get_mut(files_handle)?)?;
        }

        let files_offset = (HEADER_SIZE + FOLDER_SIZE) as u64;
        let data_offset = files_offset + self.table.get(files_handle)?.len() as u64;
        let cabinet_size = data_offset + self.table.get(data_handle)?.len() as u64;

        let header = CabHeader {
            cabinet_size: to_u32(cabinet_size)?,
            files_offset: files_offset as u32,
            version_minor: 3,
            version_major: 1,
            num_folders: 1,
            num_files,
            ..Default::default()
        };
        let folder = CabFolder {
            data_offset: to_u32(data_offset)?,
            num_data_blocks,
            compression_type: CompressionType::Lzx(self.window_bits as u8),
        };

        let cabinet = self.table.create();
        header.write(self.table.get_mut(cabinet)?)?;
        folder.write(self.table.get_mut(cabinet)?)?;
        self.table.drain_into(files_handle, cabinet)?;
        self.table.drain_into(data_handle, cabinet)?;

        debug!(
            files = num_files,
            blocks = num_data_blocks,
            input = folder_offset,
            cabinet = cabinet_size,
            "built LZX cabinet"
        );

        Ok(self.table.remove(cabinet)?.into_inner())
    }

    fn write_block(
        &mut self,
        encoder: &mut LzxEncoder,
        frame: &[u8],
        data_handle: Handle,
    ) -> Result<()> {
        let chunk = encoder.compress_frame(frame)?;
        let block = CfData::for_block(&chunk, frame.len() as u16)?;
        block.write(self.table.get_mut(data_handle)?)?;
        self.table.write(data_handle, &chunk)
    }
}

fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| HecompError::input_too_large(value, u32::MAX as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cab::header::{FIRST_FOLDER_BLOCK_COUNT, FIRST_FOLDER_DATA_OFFSET};

    #[test]
    fn test_layout_of_single_file_cabinet() {
        let mut writer = CabWriter::new(17).unwrap();
        writer.add_file("data.bin", &[1, 2, 3]).unwrap();
        let cab = writer.finish().unwrap();

        assert_eq!(&cab[..4], b"MSCF");
        assert_eq!(u32::from_le_bytes([cab[8], cab[9], cab[10], cab[11]]) as usize, cab.len());
        // coffFiles follows one folder
        assert_eq!(u32::from_le_bytes([cab[16], cab[17], cab[18], cab[19]]), 44);
        assert_eq!((cab[25], cab[24]), (1, 3));

        let data_offset = u32::from_le_bytes([
            cab[FIRST_FOLDER_DATA_OFFSET],
            cab[FIRST_FOLDER_DATA_OFFSET + 1],
            cab[FIRST_FOLDER_DATA_OFFSET + 2],
            cab[FIRST_FOLDER_DATA_OFFSET + 3],
        ]);
        // header + folder + CFFILE (16 + "data.bin\0")
        assert_eq!(data_offset, 44 + 16 + 9);
        assert_eq!(
            u16::from_le_bytes([cab[FIRST_FOLDER_BLOCK_COUNT], cab[FIRST_FOLDER_BLOCK_COUNT + 1]]),
            1
        );
        assert_eq!(u16::from_le_bytes([cab[42], cab[43]]), 0x1103);
    }

    #[test]
    fn test_blocks_split_at_frame_size() {
        let data = vec![0x5Au8; FRAME_SIZE * 2 + 7];
        let mut writer = CabWriter::new(16).unwrap();
        writer.add_file("big", &data).unwrap();
        let cab = writer.finish().unwrap();
        assert_eq!(u16::from_le_bytes([cab[40], cab[41]]), 3);
    }

    #[test]
    fn test_files_share_blocks() {
        let mut writer = CabWriter::new(17).unwrap();
        writer.add_file("a", &vec![1u8; FRAME_SIZE - 10]).unwrap();
        writer.add_file("b", &vec![2u8; 20]).unwrap();
        let cab = writer.finish().unwrap();
        // 32778 bytes in total -> two blocks
        assert_eq!(u16::from_le_bytes([cab[40], cab[41]]), 2);
        assert_eq!(u16::from_le_bytes([cab[28], cab[29]]), 2);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(CabWriter::new(14).is_err());
        assert!(CabWriter::new(22).is_err());
        let mut writer = CabWriter::new(17).unwrap();
        assert!(writer.add_file("", b"x").is_err());
    }

    #[test]
    fn test_empty_file() {
        let mut writer = CabWriter::new(17).unwrap();
        writer.add_file("empty", &[]).unwrap();
        let cab = writer.finish().unwrap();
        assert_eq!(u16::from_le_bytes([cab[40], cab[41]]), 0);
        assert_eq!(u32::from_le_bytes([cab[8], cab[9], cab[10], cab[11]]) as usize, cab.len());
    }
}
