//! The file API: handles, buffered writes, replace-on-write and compaction.

use log::{debug, warn};
use serde::Serialize;

use crate::config::FsConfig;
use crate::directory::Directory;
use crate::error::{FsError, FsResult};
use crate::handle::{FileId, Handle, HandleTable, OpenMode};
use crate::layout::{DirEntry, FileName, HEADER_SIZE, ENTRY_SIZE};
use crate::storage::Storage;

/// A writer reports end of file once this few bytes remain before the directory.
pub const WRITE_EOF_SLACK: u32 = 2;

/// Space accounting for a mounted region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SpaceUsage {
    pub capacity: u32,
    /// Bytes held by file payloads.
    pub used: u32,
    /// Bytes between the end of file space and the directory.
    pub free: u32,
    /// Header plus directory entries.
    pub directory: u32,
}

/// Coalesces small writes before they reach storage.
#[derive(Debug)]
struct WriteBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl WriteBuffer {
    fn new(size: usize) -> Self {
        Self {
            data: vec![0; size].into_boxed_slice(),
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn clear(&mut self) {
        self.len = 0;
    }
}

/// Single-level file system on a flat storage region.
///
/// Owns the storage, the cached directory state and the handle table.
/// Every call runs to completion; there is no internal locking.
pub struct FileSystem<S: Storage> {
    storage: S,
    dir: Directory,
    handles: HandleTable,
    buffer: WriteBuffer,
    config: FsConfig,
}

impl<S: Storage> FileSystem<S> {
    /// Erase the directory and start an empty file system.
    pub fn format(mut storage: S, config: FsConfig) -> FsResult<Self> {
        config.validate()?;
        let dir = Directory::format(&mut storage)?;
        Ok(Self::with_directory(storage, dir, config))
    }

    pub(crate) fn with_directory(storage: S, dir: Directory, config: FsConfig) -> Self {
        Self {
            storage,
            dir,
            handles: HandleTable::new(config.max_open_files),
            buffer: WriteBuffer::new(config.write_buffer_size),
            config,
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Give back the storage. Open handles are dropped without flushing.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Number of handles currently open.
    pub fn open_count(&self) -> usize {
        self.handles.open_count()
    }

    /// Open an existing, non-empty file for reading.
    pub fn open_read(&mut self, name: FileName) -> FsResult<FileId> {
        if !name.is_valid() {
            return Err(FsError::InvalidName);
        }
        self.handles
            .admit(OpenMode::Read, self.config.exclusive_open)?;
        let (dir_index, entry) = self
            .dir
            .find(&mut self.storage, name)?
            .filter(|(_, entry)| entry.length > 0)
            .ok_or(FsError::NotFound(name))?;

        let id = self.handles.insert(Handle::Reading {
            dir_index,
            start: entry.offset,
            length: entry.length as u32,
            pos: 0,
        })?;
        debug!("{} opened {} for reading ({} bytes)", id, name, entry.length);
        Ok(id)
    }

    /// Create `name` for writing, deleting any existing file of that name first.
    pub fn open_write(&mut self, name: FileName) -> FsResult<FileId> {
        if !name.is_valid() {
            return Err(FsError::InvalidName);
        }
        self.handles
            .admit(OpenMode::Write, self.config.exclusive_open)?;
        if let Some((index, _)) = self.dir.find(&mut self.storage, name)? {
            self.dir.remove(&mut self.storage, index)?;
        }
        let (dir_index, entry) = self.dir.create(&mut self.storage, name)?;

        self.buffer.clear();
        let id = self.handles.insert(Handle::Writing {
            dir_index,
            start: entry.offset,
            written: 0,
        })?;
        debug!("{} opened {} for writing at {}", id, name, entry.offset);
        Ok(id)
    }

    /// True iff `name` is stored with a nonzero length.
    pub fn exists(&mut self, name: FileName) -> bool {
        matches!(
            self.dir.find(&mut self.storage, name),
            Ok(Some((_, entry))) if entry.length > 0
        )
    }

    /// Delete `name`, compacting file space. Returns whether it existed.
    pub fn delete(&mut self, name: FileName) -> FsResult<bool> {
        if self.handles.any_open() {
            return Err(FsError::HandlesBusy);
        }
        match self.dir.find(&mut self.storage, name)? {
            Some((index, _)) => {
                self.dir.remove(&mut self.storage, index)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Next byte, or `None` at end of file.
    pub fn read_char(&mut self, id: FileId) -> FsResult<Option<u8>> {
        let mut byte = [0u8; 1];
        Ok(match self.read_data(id, &mut byte)? {
            0 => None,
            _ => Some(byte[0]),
        })
    }

    /// Read up to `buf.len()` bytes. Returns 0 at end of file.
    pub fn read_data(&mut self, id: FileId, buf: &mut [u8]) -> FsResult<usize> {
        let Handle::Reading {
            start, length, pos, ..
        } = *self.handles.get(id)?
        else {
            return Err(FsError::WrongMode);
        };

        let n = (length - pos).min(buf.len() as u32);
        if n > 0 {
            self.storage.read(start + pos, &mut buf[..n as usize])?;
            if let Handle::Reading { pos, .. } = self.handles.get_mut(id)? {
                *pos += n;
            }
        }
        Ok(n as usize)
    }

    pub fn write_char(&mut self, id: FileId, byte: u8) -> FsResult<()> {
        self.write_data(id, &[byte])
    }

    /// Append `data` to a file open for writing. All or nothing.
    pub fn write_data(&mut self, id: FileId, data: &[u8]) -> FsResult<()> {
        let Handle::Writing { start, written, .. } = *self.handles.get(id)? else {
            return Err(FsError::WrongMode);
        };
        if data.is_empty() {
            return Ok(());
        }
        if written as usize + data.len() > u16::MAX as usize {
            return Err(FsError::FileTooLarge);
        }
        let end = start as u64 + written as u64 + data.len() as u64;
        if end >= self.dir.dir_start() as u64 {
            warn!(
                "{}: {} byte write would reach directory at {}",
                id,
                data.len(),
                self.dir.dir_start()
            );
            return Err(FsError::DiskFull);
        }

        self.buffered_write(start + written, data)?;
        if let Handle::Writing { written, .. } = self.handles.get_mut(id)? {
            *written += data.len() as u32;
        }
        Ok(())
    }

    /// Readers: nothing left to read. Writers: (nearly) out of space.
    ///
    /// The writer check errs early by `WRITE_EOF_SLACK` bytes so callers stop
    /// before a write fails. Unknown handles report end of file.
    pub fn eof(&self, id: FileId) -> bool {
        match self.handles.get(id) {
            Ok(&Handle::Reading { length, pos, .. }) => pos >= length,
            Ok(&Handle::Writing { start, written, .. }) => {
                written >= u16::MAX as u32
                    || self.dir.dir_start().saturating_sub(start + written) <= WRITE_EOF_SLACK
            }
            Err(_) => true,
        }
    }

    pub fn is_read(&self, id: FileId) -> bool {
        matches!(self.handles.get(id), Ok(h) if h.mode() == OpenMode::Read)
    }

    pub fn is_write(&self, id: FileId) -> bool {
        matches!(self.handles.get(id), Ok(h) if h.mode() == OpenMode::Write)
    }

    /// Move a reader to `pos`, which must lie inside the file.
    pub fn seek(&mut self, id: FileId, target: u32) -> FsResult<()> {
        match self.handles.get_mut(id)? {
            Handle::Reading { length, pos, .. } => {
                if target >= *length {
                    return Err(FsError::SeekOutOfRange {
                        pos: target,
                        len: *length,
                    });
                }
                *pos = target;
                Ok(())
            }
            Handle::Writing { .. } => Err(FsError::WrongMode),
        }
    }

    /// Current position: bytes read so far, or bytes written so far.
    pub fn getpos(&self, id: FileId) -> FsResult<u32> {
        Ok(match *self.handles.get(id)? {
            Handle::Reading { pos, .. } => pos,
            Handle::Writing { written, .. } => written,
        })
    }

    /// Release a handle. Writers flush and record their final length.
    pub fn close(&mut self, id: FileId) -> FsResult<()> {
        let handle = self.handles.remove(id)?;
        let Handle::Writing {
            dir_index,
            start,
            written,
        } = handle
        else {
            return Ok(());
        };

        let pending = self.buffer.len as u32;
        let flushed = self.flush_buffer(start + written);
        let length = if flushed.is_ok() {
            written
        } else {
            written - pending
        };
        self.buffer.clear();

        let mut entry = self.dir.read_entry(&mut self.storage, dir_index)?;
        entry.length = length as u16;
        self.dir.write_entry(&mut self.storage, dir_index, &entry)?;
        debug!("{} closed {} with {} bytes", id, entry.name, length);
        flushed
    }

    /// Store `data` as `name` in one call.
    ///
    /// Overwrites in place when the stored length already matches; otherwise
    /// replaces the file. A failed write leaves no entry behind.
    pub fn write_whole_file(&mut self, name: FileName, data: &[u8]) -> FsResult<()> {
        if !name.is_valid() {
            return Err(FsError::InvalidName);
        }
        self.handles
            .admit(OpenMode::Write, self.config.exclusive_open)?;
        if let Some((_, entry)) = self.dir.find(&mut self.storage, name)? {
            if entry.length > 0 && entry.length as usize == data.len() {
                debug!("overwriting {} in place", name);
                return self.storage.write(entry.offset, data);
            }
        }

        let id = self.open_write(name)?;
        if let Err(e) = self.write_data(id, data) {
            if let Err(abandon) = self.abandon(id) {
                warn!("could not discard partial {}: {}", name, abandon);
            }
            return Err(e);
        }
        self.close(id)
    }

    /// Read up to `buf.len()` bytes of `name` from its start.
    pub fn read_whole_file(&mut self, name: FileName, buf: &mut [u8]) -> FsResult<usize> {
        let id = self.open_read(name)?;
        let read = self.read_data(id, buf);
        self.close(id)?;
        read
    }

    /// Read all of `name` into a new vector.
    pub fn read_file(&mut self, name: FileName) -> FsResult<Vec<u8>> {
        let length = match self.dir.find(&mut self.storage, name)? {
            Some((_, entry)) => entry.length as usize,
            None => return Err(FsError::NotFound(name)),
        };
        let mut data = vec![0u8; length];
        let n = self.read_whole_file(name, &mut data)?;
        data.truncate(n);
        Ok(data)
    }

    /// Directory entries in stored order.
    pub fn entries(&mut self) -> FsResult<Vec<DirEntry>> {
        self.dir.entries(&mut self.storage)
    }

    pub fn filespace_end(&mut self) -> FsResult<u32> {
        self.dir.filespace_end(&mut self.storage)
    }

    pub fn dir_start(&self) -> u32 {
        self.dir.dir_start()
    }

    pub fn usage(&mut self) -> FsResult<SpaceUsage> {
        let entries = self.entries()?;
        let end = entries.iter().map(DirEntry::end).max().unwrap_or(0);
        Ok(SpaceUsage {
            capacity: self.dir.capacity(),
            used: entries.iter().map(|e| e.length as u32).sum(),
            free: self.dir.dir_start().saturating_sub(end),
            directory: HEADER_SIZE + entries.len() as u32 * ENTRY_SIZE,
        })
    }

    /// Verify the on-storage invariants.
    pub fn check(&mut self) -> FsResult<()> {
        self.dir.check(&mut self.storage)
    }

    /// Drop a write handle and its directory entry.
    fn abandon(&mut self, id: FileId) -> FsResult<()> {
        let handle = self.handles.remove(id)?;
        self.buffer.clear();
        if let Handle::Writing { dir_index, .. } = handle {
            self.dir.remove(&mut self.storage, dir_index)?;
        }
        Ok(())
    }

    /// Write `data` that logically belongs at `pos`, coalescing small writes.
    fn buffered_write(&mut self, pos: u32, data: &[u8]) -> FsResult<()> {
        let capacity = self.buffer.capacity();
        if capacity == 0 {
            return self.storage.write(pos, data);
        }
        if data.len() > capacity / 2 {
            self.flush_buffer(pos)?;
            return self.storage.write(pos, data);
        }
        if self.buffer.len + data.len() > capacity {
            self.flush_buffer(pos)?;
        }
        let len = self.buffer.len;
        self.buffer.data[len..len + data.len()].copy_from_slice(data);
        self.buffer.len += data.len();
        Ok(())
    }

    /// Flush buffered bytes, which end at logical position `pos`.
    fn flush_buffer(&mut self, pos: u32) -> FsResult<()> {
        let len = self.buffer.len;
        if len > 0 {
            self.storage
                .write(pos - len as u32, &self.buffer.data[..len])?;
            self.buffer.len = 0;
        }
        Ok(())
    }
}
