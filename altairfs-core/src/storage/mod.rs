//! Storage backends: the flat, fixed-capacity byte region the file system lives in.
//!
//! - `Storage`: the backend contract (read / write / move / invalidate)
//! - `MemoryStorage`: a region held in RAM
//! - `FileStorage`: a region held in a host image file
//! - `range`: bounds checks and the overlap-safe chunked move

mod file;
mod memory;
pub mod range;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::{FsError, FsResult};
use crate::layout::HEADER_SIZE;

/// Byte value of never-written storage.
pub const ERASED: u8 = 0xFF;

/// A fixed-capacity byte region `[0, capacity)`.
///
/// Every operation is synchronous and runs to completion. Offsets and
/// lengths are checked against `capacity()`; out-of-range requests fail
/// with `FsError::OutOfBounds` and leave the region untouched.
pub trait Storage {
    /// Size of the region in bytes.
    fn capacity(&self) -> u32;

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> FsResult<()>;

    /// Copy `data` into the region starting at `offset`.
    fn write(&mut self, offset: u32, data: &[u8]) -> FsResult<()>;

    /// Shift `len` bytes from `src` to `dst`. Correct when the ranges overlap.
    fn move_range(&mut self, dst: u32, src: u32, len: u32) -> FsResult<()> {
        range::chunked_move(self, dst, src, len)
    }

    /// Mark the region so it is not taken for a valid file system on next mount.
    fn invalidate(&mut self) -> FsResult<()> {
        let capacity = self.capacity();
        let header = capacity
            .checked_sub(HEADER_SIZE)
            .ok_or(FsError::OutOfBounds {
                offset: 0,
                len: HEADER_SIZE,
                capacity,
            })?;
        self.write(header, &[ERASED; HEADER_SIZE as usize])
    }
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn capacity(&self) -> u32 {
        (**self).capacity()
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> FsResult<()> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> FsResult<()> {
        (**self).write(offset, data)
    }

    fn move_range(&mut self, dst: u32, src: u32, len: u32) -> FsResult<()> {
        (**self).move_range(dst, src, len)
    }

    fn invalidate(&mut self) -> FsResult<()> {
        (**self).invalidate()
    }
}
