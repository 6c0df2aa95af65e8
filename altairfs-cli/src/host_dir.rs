//! Host directory as a migration destination.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use altairfs_core::{host_file_name, FileName, FileSink, FsResult};

/// Writes each file to `<dir>/<NAME>.BIN`.
pub struct HostDirSink {
    dir: PathBuf,
}

impl HostDirSink {
    /// Use `dir`, creating it if needed.
    pub fn new(dir: &Path) -> FsResult<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }
}

impl FileSink for HostDirSink {
    type Handle = File;

    fn open_write(&mut self, name: FileName) -> FsResult<File> {
        Ok(File::create(self.dir.join(host_file_name(name)))?)
    }

    fn write_data(&mut self, handle: &mut File, data: &[u8]) -> FsResult<()> {
        handle.write_all(data)?;
        Ok(())
    }

    fn close(&mut self, mut handle: File) -> FsResult<()> {
        handle.flush()?;
        handle.sync_all()?;
        Ok(())
    }
}
