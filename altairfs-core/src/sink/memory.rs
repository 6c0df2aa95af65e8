//! In-memory file sink.

use std::collections::HashMap;

use super::FileSink;
use crate::error::FsResult;
use crate::layout::FileName;

/// Files kept in a map. A file becomes visible when it is closed.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    files: HashMap<FileName, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_file(&self, name: FileName) -> Option<&[u8]> {
        self.files.get(&name).map(Vec::as_slice)
    }

    /// Stored names, sorted.
    pub fn list_files(&self) -> Vec<FileName> {
        let mut names: Vec<FileName> = self.files.keys().copied().collect();
        names.sort();
        names
    }

    pub fn exists(&self, name: FileName) -> bool {
        self.files.contains_key(&name)
    }
}

impl FileSink for MemorySink {
    type Handle = (FileName, Vec<u8>);

    fn open_write(&mut self, name: FileName) -> FsResult<Self::Handle> {
        Ok((name, Vec::new()))
    }

    fn write_data(&mut self, handle: &mut Self::Handle, data: &[u8]) -> FsResult<()> {
        handle.1.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self, (name, data): Self::Handle) -> FsResult<()> {
        self.files.insert(name, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_after_close() {
        let mut sink = MemorySink::new();
        let name = FileName::new(b'C', 0);
        let mut handle = sink.open_write(name).unwrap();
        sink.write_data(&mut handle, b"ab").unwrap();
        sink.write_data(&mut handle, b"cd").unwrap();
        assert!(!sink.exists(name));

        sink.close(handle).unwrap();
        assert_eq!(sink.read_file(name), Some(&b"abcd"[..]));
    }

    #[test]
    fn test_rewrite_replaces() {
        let mut sink = MemorySink::new();
        let name = FileName::new(b'C', 0);
        for data in [&b"first"[..], &b"2nd"[..]] {
            let mut handle = sink.open_write(name).unwrap();
            sink.write_data(&mut handle, data).unwrap();
            sink.close(handle).unwrap();
        }
        assert_eq!(sink.read_file(name), Some(&b"2nd"[..]));
        assert_eq!(sink.list_files(), vec![name]);
    }
}
