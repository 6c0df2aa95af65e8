//! Open-file handles.

use std::fmt;
use std::num::NonZeroU8;

use crate::error::{FsError, FsResult};

/// Opaque id of an open file. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(NonZeroU8);

impl FileId {
    fn from_slot(slot: usize) -> Self {
        // slot < 255 is guaranteed by FsConfig::validate
        Self(NonZeroU8::new(slot as u8 + 1).unwrap_or(NonZeroU8::MAX))
    }

    fn slot(self) -> usize {
        self.0.get() as usize - 1
    }

    /// Raw handle value, as handed to emulated software.
    pub fn raw(self) -> u8 {
        self.0.get()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// State of one open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Reading {
        dir_index: usize,
        /// Storage offset of the file's first byte.
        start: u32,
        length: u32,
        pos: u32,
    },
    Writing {
        dir_index: usize,
        start: u32,
        /// Bytes accepted so far, buffered ones included.
        written: u32,
    },
}

impl Handle {
    pub fn mode(&self) -> OpenMode {
        match self {
            Handle::Reading { .. } => OpenMode::Read,
            Handle::Writing { .. } => OpenMode::Write,
        }
    }

    pub fn dir_index(&self) -> usize {
        match *self {
            Handle::Reading { dir_index, .. } | Handle::Writing { dir_index, .. } => dir_index,
        }
    }
}

/// Fixed-size table of handle slots.
#[derive(Debug, Clone)]
pub struct HandleTable {
    slots: Vec<Option<Handle>>,
}

impl HandleTable {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn any_open(&self) -> bool {
        self.slots.iter().any(Option::is_some)
    }

    pub fn writer_open(&self) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|h| h.mode() == OpenMode::Write)
    }

    /// Decide whether a new handle of `mode` may be opened.
    ///
    /// With `exclusive` set nothing may be opened while any handle exists.
    /// Otherwise readers may share the table, but a writer excludes everyone.
    pub fn admit(&self, mode: OpenMode, exclusive: bool) -> FsResult<()> {
        let blocked = if exclusive || mode == OpenMode::Write {
            self.any_open()
        } else {
            self.writer_open()
        };
        if blocked {
            return Err(FsError::HandlesBusy);
        }
        if self.slots.iter().all(Option::is_some) {
            return Err(FsError::NoFreeHandle);
        }
        Ok(())
    }

    pub fn insert(&mut self, handle: Handle) -> FsResult<FileId> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::NoFreeHandle)?;
        self.slots[slot] = Some(handle);
        Ok(FileId::from_slot(slot))
    }

    pub fn get(&self, id: FileId) -> FsResult<&Handle> {
        self.slots
            .get(id.slot())
            .and_then(Option::as_ref)
            .ok_or(FsError::InvalidHandle(id.raw()))
    }

    pub fn get_mut(&mut self, id: FileId) -> FsResult<&mut Handle> {
        self.slots
            .get_mut(id.slot())
            .and_then(Option::as_mut)
            .ok_or(FsError::InvalidHandle(id.raw()))
    }

    pub fn remove(&mut self, id: FileId) -> FsResult<Handle> {
        self.slots
            .get_mut(id.slot())
            .and_then(Option::take)
            .ok_or(FsError::InvalidHandle(id.raw()))
    }
}
