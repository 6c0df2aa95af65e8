//! Storage region backed by a host image file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::range::{checked_range, region_capacity};
use super::{Storage, ERASED};
use crate::error::FsResult;

/// A region stored in a fixed-size file on the host.
///
/// The file length is the capacity; it never grows or shrinks.
pub struct FileStorage {
    file: File,
    capacity: u32,
}

impl FileStorage {
    /// Create (or truncate) an image file of `capacity` erased bytes.
    pub fn create(path: &Path, capacity: u32) -> FsResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let erased = [ERASED; 512];
        let mut remaining = capacity as usize;
        while remaining > 0 {
            let n = remaining.min(erased.len());
            file.write_all(&erased[..n])?;
            remaining -= n;
        }
        file.flush()?;
        Ok(Self { file, capacity })
    }

    /// Open an existing image file. Its length becomes the capacity.
    pub fn open(path: &Path) -> FsResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        let capacity = region_capacity(len)?;
        Ok(Self { file, capacity })
    }

    /// Flush pending writes to the host.
    pub fn sync(&mut self) -> FsResult<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> FsResult<()> {
        checked_range(offset, buf.len() as u32, self.capacity)?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> FsResult<()> {
        checked_range(offset, data.len() as u32, self.capacity)?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(data)?;
        Ok(())
    }
}
