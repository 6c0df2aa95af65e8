//! In-memory storage region.

use super::range::{checked_range, region_capacity};
use super::{Storage, ERASED};
use crate::error::FsResult;

/// Fixed-capacity region held in RAM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStorage {
    bytes: Vec<u8>,
    capacity: u32,
}

impl MemoryStorage {
    /// Create an erased region of `capacity` bytes.
    pub fn new(capacity: u32) -> Self {
        Self {
            bytes: vec![ERASED; capacity as usize],
            capacity,
        }
    }

    /// Wrap existing region contents (e.g. a dump of a device).
    ///
    /// Fails for dumps larger than a `u32` can address.
    pub fn from_bytes(bytes: Vec<u8>) -> FsResult<Self> {
        let capacity = region_capacity(bytes.len() as u64)?;
        Ok(Self { bytes, capacity })
    }

    /// Raw region contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume and return the raw contents.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Storage for MemoryStorage {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> FsResult<()> {
        let range = checked_range(offset, buf.len() as u32, self.capacity())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> FsResult<()> {
        let range = checked_range(offset, data.len() as u32, self.capacity())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    fn move_range(&mut self, dst: u32, src: u32, len: u32) -> FsResult<()> {
        let capacity = self.capacity();
        let src = checked_range(src, len, capacity)?;
        checked_range(dst, len, capacity)?;
        self.bytes.copy_within(src, dst as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_erased() {
        let storage = MemoryStorage::new(32);
        assert_eq!(storage.capacity(), 32);
        assert!(storage.as_bytes().iter().all(|&b| b == ERASED));
    }

    #[test]
    fn test_from_bytes_takes_length_as_capacity() {
        let storage = MemoryStorage::from_bytes(vec![0; 48]).unwrap();
        assert_eq!(storage.capacity(), 48);
        assert_eq!(storage.into_bytes().len(), 48);
    }

    #[test]
    fn test_write_read() {
        let mut storage = MemoryStorage::new(16);
        storage.write(4, b"ABCD").unwrap();

        let mut buf = [0u8; 4];
        storage.read(4, &mut buf).unwrap();
        assert_eq!(&buf, b"ABCD");
    }

    #[test]
    fn test_bounds() {
        let mut storage = MemoryStorage::new(16);
        assert!(storage.write(14, b"ABC").is_err());
        let mut buf = [0u8; 2];
        assert!(storage.read(15, &mut buf).is_err());
        assert!(storage.move_range(10, 0, 7).is_err());
    }

    #[test]
    fn test_move_overlapping() {
        let mut storage = MemoryStorage::from_bytes(b"0123456789".to_vec()).unwrap();
        storage.move_range(0, 3, 7).unwrap();
        assert_eq!(storage.as_bytes(), b"3456789789");
    }

    #[test]
    fn test_invalidate_erases_header() {
        let mut storage = MemoryStorage::from_bytes(vec![0; 12]).unwrap();
        storage.invalidate().unwrap();
        assert_eq!(&storage.as_bytes()[..8], &[0; 8]);
        assert_eq!(&storage.as_bytes()[8..], &[ERASED; 4]);
    }
}
