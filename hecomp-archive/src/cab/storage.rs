//! In-memory stream arena for cabinet building.
//!
//! The cabinet writer never touches the filesystem: the source file, the
//! spill streams for CFFILE and CFDATA records and the finished cabinet
//! all live in a [`HandleTable`] and are addressed by integer handles.
//! Handles are never reused, so a deleted handle stays invalid.

use hecomp_core::{HecompError, MemoryStream, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// Index of a stream in a [`HandleTable`].
pub type Handle = usize;

/// Arena of [`MemoryStream`]s.
#[derive(Debug, Default)]
pub struct HandleTable {
    slots: Vec<Option<MemoryStream>>,
}

impl HandleTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new, empty stream.
    pub fn create(&mut self) -> Handle {
        self.insert(MemoryStream::new())
    }

    /// Register an existing stream.
    pub fn insert(&mut self, stream: MemoryStream) -> Handle {
        self.slots.push(Some(stream));
        self.slots.len() - 1
    }

    /// Borrow a live stream.
    pub fn get(&self, handle: Handle) -> Result<&MemoryStream> {
        self.slots
            .get(handle)
            .and_then(Option::as_ref)
            .ok_or_else(|| HecompError::invalid_handle(handle))
    }

    /// Mutably borrow a live stream.
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut MemoryStream> {
        self.slots
            .get_mut(handle)
            .and_then(Option::as_mut)
            .ok_or_else(|| HecompError::invalid_handle(handle))
    }

    /// Delete a stream, returning its contents.
    pub fn remove(&mut self, handle: Handle) -> Result<MemoryStream> {
        self.slots
            .get_mut(handle)
            .and_then(Option::take)
            .ok_or_else(|| HecompError::invalid_handle(handle))
    }

    /// Read from a stream at its current position.
    pub fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        Ok(self.get_mut(handle)?.read(buf)?)
    }

    /// Write to a stream at its current position.
    pub fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<()> {
        self.get_mut(handle)?.write_all(buf)?;
        Ok(())
    }

    /// Seek a stream.
    pub fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        Ok(self.get_mut(handle)?.seek(pos)?)
    }

    /// Current position of a stream.
    pub fn tell(&self, handle: Handle) -> Result<u64> {
        Ok(self.get(handle)?.tell())
    }

    /// Append the whole of `from` to `to` and delete `from`.
    pub fn drain_into(&mut self, from: Handle, to: Handle) -> Result<()> {
        let source = self.remove(from)?;
        self.write(to, source.as_slice())
    }

    /// Number of live streams.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Check if no streams are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
