//! Compress and decompress commands.

use crate::replace::{FileOps, StdFileOps, replace_file};
use crate::utils::{file_name, group_by_directory};
use hecomp_archive::detect::Signature;
use hecomp_archive::{cab, xcompress};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Refusal text for inputs that are already compressed.
pub const ALREADY_COMPRESSED: &str = "Already compressed! Skipping";

/// Refusal text for decompressing raw inputs.
pub const NOT_COMPRESSED: &str = "Not compressed! Skipping";

/// What to do with each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Raw to XCompress
    XCompress,
    /// Raw to LZX cabinet
    Cabinet,
    /// XCompress or cabinet to raw
    Decompress,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XCompress => write!(f, "XCompress compression"),
            Self::Cabinet => write!(f, "Cabinet compression"),
            Self::Decompress => write!(f, "Decompression"),
        }
    }
}

/// Result of processing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Replaced in place
    Done(String),
    /// Left untouched on purpose
    Skipped(String),
    /// Not processed
    Failed(String),
}

impl Outcome {
    /// Report line for the file called `name`.
    pub fn report(&self, name: &str) -> String {
        match self {
            Self::Done(result) => format!("{} => {}", name, result),
            Self::Skipped(result) | Self::Failed(result) => format!("{}: {}", result, name),
        }
    }
}

/// Process `files` directory by directory, reporting each one to `out`.
pub fn cmd_transcode<W: Write>(
    out: &mut W,
    files: &[PathBuf],
    operation: Operation,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = std::env::current_dir().ok();

    for group in group_by_directory(files, base.as_deref()) {
        writeln!(out, "\nDirectory: {}\n", group.display)?;
        for path in &group.files {
            let outcome = transcode_file(&StdFileOps, path, operation);
            writeln!(out, "{}", outcome.report(&file_name(path)))?;
        }
    }

    Ok(())
}

/// Transcode one file in place.
pub fn transcode_file(ops: &impl FileOps, path: &Path, operation: Operation) -> Outcome {
    let input = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read input");
            return Outcome::Failed(format!("Cannot read file ({})", e));
        }
    };

    let signature = Signature::from_bytes(&input);
    let name = file_name(path);
    debug!(path = %path.display(), %signature, size = input.len(), "classified input");

    let result = match (operation, signature) {
        (Operation::Decompress, Signature::Raw) => {
            return Outcome::Skipped(NOT_COMPRESSED.to_string());
        }
        (Operation::Decompress, Signature::XCompress(_)) => xcompress::decompress(&input),
        (Operation::Decompress, Signature::Cabinet) => cab::decompress(&input),
        (_, signature) if signature.is_compressed() => {
            return Outcome::Skipped(ALREADY_COMPRESSED.to_string());
        }
        (Operation::XCompress, _) => xcompress::compress(&input, &name),
        (Operation::Cabinet, _) => cab::compress(&input, &name, cab::DEFAULT_WINDOW_BITS),
    };

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "{} failed", operation);
            return Outcome::Failed(format!("{} failed ({})", operation, e));
        }
    };

    match replace_file(ops, path, &output) {
        Ok(()) => {
            debug!(
                path = %path.display(),
                before = input.len(),
                after = output.len(),
                "replaced file"
            );
            Outcome::Done(name)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot replace file");
            Outcome::Failed(e.to_string())
        }
    }
}
