//! In-place file replacement through a sibling temporary file.
//!
//! The new contents are written to `<path>.tmp`, the original is removed and
//! the temporary is renamed into place. If the removal fails the temporary is
//! deleted and the original stays. If the rename fails the original is
//! already gone; the temporary is left on disk so the data can be recovered.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Filesystem operations used by [`replace_file`].
pub trait FileOps {
    /// Create or truncate `path` and write `data`.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    /// Delete a file.
    fn remove(&self, path: &Path) -> io::Result<()>;
    /// Rename a file.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        std::fs::write(path, data)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }
}

/// Why a replacement failed.
#[derive(Debug, Error)]
pub enum ReplaceError {
    /// The temporary file could not be written.
    #[error("Cannot write temporary file ({source})")]
    Write {
        /// Underlying error
        source: io::Error,
    },

    /// The original could not be removed; it is unchanged.
    #[error("Cannot remove original ({source})")]
    Remove {
        /// Underlying error
        source: io::Error,
    },

    /// The temporary could not be renamed after the original was removed.
    #[error("Cannot rename {} into place ({source})", .temp.display())]
    Rename {
        /// Temporary file holding the new contents
        temp: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

/// `<path>.tmp`
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replace the contents of `path` with `data`.
pub fn replace_file(ops: &impl FileOps, path: &Path, data: &[u8]) -> Result<(), ReplaceError> {
    let temp = temp_path(path);

    if let Err(source) = ops.write(&temp, data) {
        discard(ops, &temp);
        return Err(ReplaceError::Write { source });
    }

    if let Err(source) = ops.remove(path) {
        discard(ops, &temp);
        return Err(ReplaceError::Remove { source });
    }

    if let Err(source) = ops.rename(&temp, path) {
        warn!(
            original = %path.display(),
            temp = %temp.display(),
            "original removed but rename failed; new contents remain in the temporary file"
        );
        return Err(ReplaceError::Rename { temp, source });
    }

    Ok(())
}

fn discard(ops: &impl FileOps, temp: &Path) {
    if let Err(e) = ops.remove(temp) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(temp = %temp.display(), error = %e, "cannot delete temporary file");
        }
    }
}
