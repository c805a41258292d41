//! Info command implementation.

use hecomp_archive::cab::CabReader;
use hecomp_archive::detect::Signature;
use hecomp_archive::xcompress::XCompressHeader;
use hecomp_core::ByteOrder;
use serde::Serialize;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

/// JSON serializable XCompress header.
#[derive(Debug, Serialize)]
struct XCompressJson {
    byte_order: String,
    context_flags: u32,
    flags: u32,
    window_size: u32,
    window_bits: u32,
    compression_partition_size: u32,
    version: String,
    uncompressed_size: u64,
    compressed_size: u64,
    uncompressed_block_size: u32,
    compressed_block_size_max: u32,
}

impl XCompressJson {
    fn new(header: &XCompressHeader, order: ByteOrder) -> Self {
        Self {
            byte_order: order.to_string(),
            context_flags: header.context_flags,
            flags: header.flags,
            window_size: header.window_size,
            window_bits: header.window_exponent(),
            compression_partition_size: header.compression_partition_size,
            version: format!("{}.{}", header.version >> 8, header.version & 0xFF),
            uncompressed_size: header.uncompressed_size,
            compressed_size: header.compressed_size,
            uncompressed_block_size: header.uncompressed_block_size,
            compressed_block_size_max: header.compressed_block_size_max,
        }
    }
}

/// JSON serializable cabinet entry.
#[derive(Debug, Serialize)]
struct CabFileJson {
    name: String,
    size: u32,
}

/// JSON serializable cabinet summary.
#[derive(Debug, Serialize)]
struct CabinetJson {
    version: String,
    cabinet_size: u32,
    folders: u16,
    data_blocks: u32,
    compression: Vec<String>,
    files: Vec<CabFileJson>,
}

/// JSON output for one inspected file.
#[derive(Debug, Serialize)]
struct FileInfoJson {
    file: String,
    size: u64,
    signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    xcompress: Option<XCompressJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cabinet: Option<CabinetJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn inspect(path: &Path) -> FileInfoJson {
    let mut info = FileInfoJson {
        file: path.display().to_string(),
        size: 0,
        signature: Signature::Raw.to_string(),
        xcompress: None,
        cabinet: None,
        error: None,
    };

    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            info.error = Some(e.to_string());
            return info;
        }
    };
    info.size = data.len() as u64;

    let signature = Signature::from_bytes(&data);
    info.signature = signature.to_string();

    let detail = match signature {
        Signature::Raw => Ok(()),
        Signature::XCompress(_) => XCompressHeader::parse(&data).map(|(header, order)| {
            info.xcompress = Some(XCompressJson::new(&header, order));
        }),
        Signature::Cabinet => cabinet_info(&data).map(|cabinet| info.cabinet = Some(cabinet)),
    };
    if let Err(e) = detail {
        info.error = Some(e.to_string());
    }

    info
}

fn cabinet_info(data: &[u8]) -> hecomp_core::Result<CabinetJson> {
    let cab = CabReader::new(Cursor::new(data))?;
    let (major, minor) = cab.version();

    Ok(CabinetJson {
        version: format!("{}.{}", major, minor),
        cabinet_size: cab.cabinet_size(),
        folders: cab.num_folders(),
        data_blocks: cab.folders().iter().map(|f| f.num_data_blocks as u32).sum(),
        compression: cab
            .folders()
            .iter()
            .map(|f| f.compression_type.to_string())
            .collect(),
        files: cab
            .files()
            .iter()
            .map(|f| CabFileJson {
                name: f.name.clone(),
                size: f.uncompressed_size,
            })
            .collect(),
    })
}

/// Report on each of `files`, as text or JSON.
pub fn cmd_info<W: Write>(
    out: &mut W,
    files: &[PathBuf],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let infos: Vec<FileInfoJson> = files.iter().map(|path| inspect(path)).collect();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&infos)?)?;
        return Ok(());
    }

    for info in &infos {
        print_info(out, info)?;
    }
    Ok(())
}

fn print_info<W: Write>(out: &mut W, info: &FileInfoJson) -> std::io::Result<()> {
    writeln!(out, "File Information")?;
    writeln!(out, "================")?;
    writeln!(out, "File: {}", info.file)?;
    writeln!(out, "Size: {} bytes", info.size)?;
    writeln!(out, "Format: {}", info.signature)?;

    if let Some(x) = &info.xcompress {
        writeln!(out)?;
        writeln!(out, "XCompress Header:")?;
        writeln!(out, "  Byte order: {}", x.byte_order)?;
        writeln!(out, "  Version: {}", x.version)?;
        writeln!(out, "  Window size: {} (2^{})", x.window_size, x.window_bits)?;
        writeln!(out, "  Partition size: {:#x}", x.compression_partition_size)?;
        writeln!(out, "  Uncompressed size: {} bytes", x.uncompressed_size)?;
        writeln!(out, "  Compressed size: {} bytes", x.compressed_size)?;
        writeln!(out, "  Block size: {} bytes", x.uncompressed_block_size)?;
        writeln!(out, "  Max compressed block: {} bytes", x.compressed_block_size_max)?;
        if x.uncompressed_size > 0 {
            writeln!(
                out,
                "  Compression ratio: {:.1}%",
                (1.0 - x.compressed_size as f64 / x.uncompressed_size as f64) * 100.0
            )?;
        }
    }

    if let Some(cab) = &info.cabinet {
        writeln!(out)?;
        writeln!(out, "Cabinet Info:")?;
        writeln!(out, "  Version: {}", cab.version)?;
        writeln!(out, "  Folders: {}", cab.folders)?;
        writeln!(out, "  Data blocks: {}", cab.data_blocks)?;
        writeln!(out, "  Compression: {}", cab.compression.join(", "))?;
        writeln!(out, "  Cabinet size: {} bytes", cab.cabinet_size)?;
        writeln!(out)?;
        writeln!(out, "Contents:")?;
        for file in &cab.files {
            writeln!(out, "  {:>10}  {}", file.size, file.name)?;
        }
    }

    if let Some(error) = &info.error {
        writeln!(out, "Error: {}", error)?;
    }
    writeln!(out)
}
