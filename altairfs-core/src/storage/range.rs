//! Bounds-checked range operations.
//!
//! All offset arithmetic against a region goes through `checked_range`, and
//! every backend without a native move shares `chunked_move`.

use std::ops::Range;

use super::Storage;
use crate::error::{FsError, FsResult};

/// Bytes shifted per step by `chunked_move`.
pub const MOVE_CHUNK: usize = 128;

/// Validate `[offset, offset + len)` against `capacity` and return it as a slice range.
pub fn checked_range(offset: u32, len: u32, capacity: u32) -> FsResult<Range<usize>> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(offset as usize..end as usize),
        _ => Err(FsError::OutOfBounds {
            offset,
            len,
            capacity,
        }),
    }
}

/// Capacity of a region `len` bytes long. Regions are addressed with `u32`.
pub fn region_capacity(len: u64) -> FsResult<u32> {
    u32::try_from(len)
        .map_err(|_| FsError::Corrupt(format!("region of {} bytes is too large", len)))
}

/// Shift `len` bytes from `src` to `dst` through the backend's `read`/`write`.
///
/// Copies low-to-high when moving down and high-to-low when moving up, so a
/// chunk is always read before any write can clobber it.
pub fn chunked_move<S: Storage + ?Sized>(
    storage: &mut S,
    dst: u32,
    src: u32,
    len: u32,
) -> FsResult<()> {
    let capacity = storage.capacity();
    checked_range(src, len, capacity)?;
    checked_range(dst, len, capacity)?;
    if len == 0 || dst == src {
        return Ok(());
    }

    let mut buf = [0u8; MOVE_CHUNK];
    if dst < src {
        let mut done = 0u32;
        while done < len {
            let n = (len - done).min(MOVE_CHUNK as u32);
            let chunk = &mut buf[..n as usize];
            storage.read(src + done, chunk)?;
            storage.write(dst + done, chunk)?;
            done += n;
        }
    } else {
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(MOVE_CHUNK as u32);
            remaining -= n;
            let chunk = &mut buf[..n as usize];
            storage.read(src + remaining, chunk)?;
            storage.write(dst + remaining, chunk)?;
        }
    }
    Ok(())
}
