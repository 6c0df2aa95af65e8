//! Destinations that files can be streamed into.
//!
//! Migration copies every legacy file through a `FileSink`, which is the
//! current format's write API: a region-backed `FileSystem`, the in-memory
//! `MemorySink`, or a host directory.

mod memory;

pub use memory::MemorySink;

use crate::error::FsResult;
use crate::filesystem::FileSystem;
use crate::handle::FileId;
use crate::layout::FileName;
use crate::storage::Storage;

/// Streaming write interface: open, append, close.
pub trait FileSink {
    /// Per-file write state.
    type Handle;

    /// Create (or replace) `name`.
    fn open_write(&mut self, name: FileName) -> FsResult<Self::Handle>;

    /// Append `data`.
    fn write_data(&mut self, handle: &mut Self::Handle, data: &[u8]) -> FsResult<()>;

    /// Finish the file.
    fn close(&mut self, handle: Self::Handle) -> FsResult<()>;
}

impl<S: Storage> FileSink for FileSystem<S> {
    type Handle = FileId;

    fn open_write(&mut self, name: FileName) -> FsResult<FileId> {
        FileSystem::open_write(self, name)
    }

    fn write_data(&mut self, handle: &mut FileId, data: &[u8]) -> FsResult<()> {
        FileSystem::write_data(self, *handle, data)
    }

    fn close(&mut self, handle: FileId) -> FsResult<()> {
        FileSystem::close(self, handle)
    }
}

/// Host file name for a stored file, e.g. `D01.BIN`.
///
/// # Examples
/// ```
/// use altairfs_core::{host_file_name, FileName};
/// assert_eq!(host_file_name(FileName::new(b'D', 1)), "D01.BIN");
/// ```
pub fn host_file_name(name: FileName) -> String {
    format!("{}.BIN", name)
}

/// Inverse of `host_file_name`. Ignores any leading path and the extension's case.
pub fn parse_host_file_name(path: &str) -> Option<FileName> {
    let base = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
    let (stem, ext) = base.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case("BIN") {
        return None;
    }
    stem.parse().ok()
}
