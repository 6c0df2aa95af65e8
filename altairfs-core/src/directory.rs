//! Directory manager.
//!
//! The directory is a packed array of 8-byte entries just below the header,
//! growing toward lower addresses. Only the entry count is cached; entries are
//! read from and written to storage on demand.

use log::{debug, warn};

use crate::error::{FsError, FsResult};
use crate::layout::{
    self, DirEntry, FileName, Signature, ENTRY_SIZE, HEADER_SIZE, MAX_ENTRIES, SIGNATURE_CURRENT,
};
use crate::storage::Storage;

/// Smallest region that can hold a header and one entry.
pub const MIN_CAPACITY: u32 = HEADER_SIZE + ENTRY_SIZE;

/// Cached directory state for one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    capacity: u32,
    count: usize,
}

impl Directory {
    /// Read the header and return the signature with the directory it describes.
    pub fn load<S: Storage>(storage: &mut S) -> FsResult<(Signature, Self)> {
        let capacity = checked_capacity(storage)?;
        let mut header = [0u8; HEADER_SIZE as usize];
        storage.read(layout::header_offset(capacity), &mut header)?;

        let signature = Signature::detect([header[1], header[2], header[3]]);
        let count = header[0] as usize;
        if signature == Signature::Unknown {
            return Ok((signature, Self { capacity, count }));
        }
        if HEADER_SIZE as u64 + count as u64 * ENTRY_SIZE as u64 > capacity as u64 {
            warn!("directory count {} does not fit {} bytes", count, capacity);
            return Err(FsError::Corrupt(format!(
                "{} entries do not fit a {} byte region",
                count, capacity
            )));
        }

        let dir = Self { capacity, count };
        // every entry must lie below the directory
        dir.entries(storage)?;
        Ok((signature, dir))
    }

    /// Write an empty directory with the current signature.
    pub fn format<S: Storage>(storage: &mut S) -> FsResult<Self> {
        let capacity = checked_capacity(storage)?;
        let mut header = [0u8; HEADER_SIZE as usize];
        header[1..].copy_from_slice(&SIGNATURE_CURRENT);
        storage.write(layout::header_offset(capacity), &header)?;
        debug!("formatted {} byte region", capacity);
        Ok(Self { capacity, count: 0 })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// First byte not available for file payload.
    pub fn dir_start(&self) -> u32 {
        layout::dir_start(self.capacity, self.count)
    }

    pub fn read_entry<S: Storage>(&self, storage: &mut S, index: usize) -> FsResult<DirEntry> {
        self.check_index(index)?;
        let mut raw = [0u8; ENTRY_SIZE as usize];
        storage.read(layout::entry_offset(self.capacity, index), &mut raw)?;
        let entry = DirEntry::decode(&raw);
        if entry.offset as u64 + entry.length as u64 > self.dir_start() as u64 {
            warn!("entry {} ({}) runs past the directory", index, entry.name);
            return Err(FsError::Corrupt(format!(
                "{} spans {}+{} past the directory at {}",
                entry.name,
                entry.offset,
                entry.length,
                self.dir_start()
            )));
        }
        Ok(entry)
    }

    pub fn write_entry<S: Storage>(
        &self,
        storage: &mut S,
        index: usize,
        entry: &DirEntry,
    ) -> FsResult<()> {
        self.check_index(index)?;
        storage.write(layout::entry_offset(self.capacity, index), &entry.encode())
    }

    /// Persist a new entry count.
    pub fn set_count<S: Storage>(&mut self, storage: &mut S, count: usize) -> FsResult<()> {
        if count > MAX_ENTRIES || layout::dir_start(self.capacity, 0) < count as u32 * ENTRY_SIZE {
            return Err(FsError::DirectoryFull);
        }
        storage.write(layout::header_offset(self.capacity), &[count as u8])?;
        self.count = count;
        Ok(())
    }

    /// First entry named `name`, by linear scan.
    pub fn find<S: Storage>(
        &self,
        storage: &mut S,
        name: FileName,
    ) -> FsResult<Option<(usize, DirEntry)>> {
        for index in 0..self.count {
            let entry = self.read_entry(storage, index)?;
            if entry.name == name {
                return Ok(Some((index, entry)));
            }
        }
        Ok(None)
    }

    /// One past the highest payload byte of any entry, or 0 if empty.
    pub fn filespace_end<S: Storage>(&self, storage: &mut S) -> FsResult<u32> {
        let mut end = 0;
        for index in 0..self.count {
            end = end.max(self.read_entry(storage, index)?.end());
        }
        Ok(end)
    }

    /// All entries in directory order.
    pub fn entries<S: Storage>(&self, storage: &mut S) -> FsResult<Vec<DirEntry>> {
        (0..self.count)
            .map(|index| self.read_entry(storage, index))
            .collect()
    }

    /// Append a zero-length entry at the current end of file space.
    pub fn create<S: Storage>(
        &mut self,
        storage: &mut S,
        name: FileName,
    ) -> FsResult<(usize, DirEntry)> {
        if !name.is_valid() {
            return Err(FsError::InvalidName);
        }
        let end = self.filespace_end(storage)?;
        let needed = end as u64 + (self.count as u64 + 1) * ENTRY_SIZE as u64 + HEADER_SIZE as u64;
        if self.count >= MAX_ENTRIES || needed >= self.capacity as u64 {
            warn!("no room for directory entry {} ({} entries)", name, self.count);
            return Err(FsError::DirectoryFull);
        }

        let index = self.count;
        let entry = DirEntry::new(name, end);
        self.count += 1;
        if let Err(e) = self.write_entry(storage, index, &entry) {
            self.count -= 1;
            return Err(e);
        }
        if let Err(e) = self.set_count(storage, index + 1) {
            self.count = index;
            return Err(e);
        }
        debug!("created {} at offset {} (entry {})", name, end, index);
        Ok((index, entry))
    }

    /// Remove entry `index`, compacting both file space and directory.
    ///
    /// Not crash safe: an interruption between the payload shift and the
    /// offset updates leaves entries pointing at stale offsets.
    pub fn remove<S: Storage>(&mut self, storage: &mut S, index: usize) -> FsResult<DirEntry> {
        let removed = self.read_entry(storage, index)?;
        let end = self.filespace_end(storage)?;

        if removed.length > 0 {
            let tail = removed.end();
            if tail < end {
                storage.move_range(removed.offset, tail, end - tail)?;
            }
            for other in (0..self.count).filter(|&i| i != index) {
                let mut entry = self.read_entry(storage, other)?;
                if entry.offset > removed.offset {
                    entry.offset = entry
                        .offset
                        .checked_sub(removed.length as u32)
                        .ok_or_else(|| {
                            FsError::Corrupt(format!(
                                "{} at {} overlaps {}",
                                entry.name, entry.offset, removed.name
                            ))
                        })?;
                    self.write_entry(storage, other, &entry)?;
                }
            }
        }

        let last = self.count - 1;
        let shifted = (last - index) as u32 * ENTRY_SIZE;
        if shifted > 0 {
            let src = layout::entry_offset(self.capacity, last);
            storage.move_range(src + ENTRY_SIZE, src, shifted)?;
        }
        self.set_count(storage, last)?;

        debug!(
            "removed {} ({} bytes at {}), file space now ends at {}",
            removed.name,
            removed.length,
            removed.offset,
            end - removed.length as u32
        );
        Ok(removed)
    }

    /// Verify the persisted layout invariants.
    pub fn check<S: Storage>(&self, storage: &mut S) -> FsResult<()> {
        let entries = self.entries(storage)?;
        if let Some(bad) = entries.iter().find(|e| !e.name.is_valid()) {
            return Err(FsError::Corrupt(format!(
                "entry at offset {} has an empty name",
                bad.offset
            )));
        }

        let end = entries.iter().map(DirEntry::end).max().unwrap_or(0);
        if end > self.dir_start() {
            return Err(FsError::Corrupt(format!(
                "file space end {} overlaps directory at {}",
                end,
                self.dir_start()
            )));
        }

        let mut occupied: Vec<&DirEntry> = entries.iter().filter(|e| e.length > 0).collect();
        occupied.sort_by_key(|e| e.offset);
        let mut cursor = 0;
        for entry in occupied {
            if entry.offset != cursor {
                return Err(FsError::Corrupt(format!(
                    "{} starts at {} but previous data ends at {}",
                    entry.name, entry.offset, cursor
                )));
            }
            cursor = entry.end();
        }

        if let Some(stray) = entries.iter().find(|e| e.length == 0 && e.offset > end) {
            return Err(FsError::Corrupt(format!(
                "empty {} points past file space at {}",
                stray.name, stray.offset
            )));
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> FsResult<()> {
        if index < self.count {
            Ok(())
        } else {
            Err(FsError::Corrupt(format!(
                "directory index {} out of range ({} entries)",
                index, self.count
            )))
        }
    }
}

fn checked_capacity<S: Storage>(storage: &S) -> FsResult<u32> {
    let capacity = storage.capacity();
    if capacity < MIN_CAPACITY {
        return Err(FsError::Corrupt(format!(
            "region of {} bytes is too small",
            capacity
        )));
    }
    Ok(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn name(tag: u8, n: u8) -> FileName {
        FileName::new(tag, n)
    }

    /// Create `name` with `len` bytes of `fill` by hand.
    fn add(dir: &mut Directory, storage: &mut MemoryStorage, file: FileName, len: u16, fill: u8) {
        let (index, mut entry) = dir.create(storage, file).unwrap();
        storage
            .write(entry.offset, &vec![fill; len as usize])
            .unwrap();
        entry.length = len;
        dir.write_entry(storage, index, &entry).unwrap();
    }

    #[test]
    fn test_format_and_load() {
        let mut storage = MemoryStorage::new(256);
        let (signature, _) = Directory::load(&mut storage).unwrap();
        assert_eq!(signature, Signature::Unknown);

        Directory::format(&mut storage).unwrap();
        assert_eq!(&storage.as_bytes()[252..], &[0, b'A', b'F', b'2']);

        let (signature, dir) = Directory::load(&mut storage).unwrap();
        assert_eq!(signature, Signature::Current);
        assert_eq!(dir.count(), 0);
        assert_eq!(dir.dir_start(), 252);
    }

    #[test]
    fn test_load_rejects_oversized_count() {
        let mut storage = MemoryStorage::new(64);
        storage.write(60, &[200, b'A', b'F', b'2']).unwrap();
        assert!(matches!(
            Directory::load(&mut storage),
            Err(FsError::Corrupt(_))
        ));
    }

    /// Region of `capacity` bytes whose single entry is `entry`.
    fn region_with_entry(capacity: u32, entry: DirEntry) -> MemoryStorage {
        let mut storage = MemoryStorage::new(capacity);
        storage
            .write(layout::header_offset(capacity), &[1, b'A', b'F', b'2'])
            .unwrap();
        storage
            .write(layout::entry_offset(capacity, 0), &entry.encode())
            .unwrap();
        storage
    }

    #[test]
    fn test_load_rejects_entry_past_directory() {
        let wrapped = DirEntry {
            name: name(b'D', 1),
            length: 0x100,
            offset: 0xFFFF_FFF0,
        };
        let mut storage = region_with_entry(1024, wrapped);
        assert!(matches!(
            Directory::load(&mut storage),
            Err(FsError::Corrupt(_))
        ));

        let overlapping = DirEntry {
            name: name(b'D', 1),
            length: 20,
            offset: 1000,
        };
        let mut storage = region_with_entry(1024, overlapping);
        assert!(matches!(
            Directory::load(&mut storage),
            Err(FsError::Corrupt(_))
        ));
    }

    #[test]
    fn test_corrupt_entry_after_load_is_reported() {
        let mut storage = MemoryStorage::new(256);
        let mut dir = Directory::format(&mut storage).unwrap();
        add(&mut dir, &mut storage, name(b'A', 0), 4, 1);
        let mut entry = dir.read_entry(&mut storage, 0).unwrap();
        entry.offset = u32::MAX - 1;
        storage
            .write(layout::entry_offset(256, 0), &entry.encode())
            .unwrap();

        assert!(matches!(dir.check(&mut storage), Err(FsError::Corrupt(_))));
        assert!(matches!(
            dir.filespace_end(&mut storage),
            Err(FsError::Corrupt(_))
        ));
        assert!(matches!(
            dir.create(&mut storage, name(b'B', 0)),
            Err(FsError::Corrupt(_))
        ));
    }

    #[test]
    fn test_too_small_region() {
        let mut storage = MemoryStorage::new(8);
        assert!(Directory::format(&mut storage).is_err());
    }

    #[test]
    fn test_create_and_find() {
        let mut storage = MemoryStorage::new(256);
        let mut dir = Directory::format(&mut storage).unwrap();
        add(&mut dir, &mut storage, name(b'D', 1), 10, 1);
        add(&mut dir, &mut storage, name(b'M', 2), 5, 2);

        assert_eq!(dir.count(), 2);
        assert_eq!(dir.filespace_end(&mut storage).unwrap(), 15);
        let (index, entry) = dir.find(&mut storage, name(b'M', 2)).unwrap().unwrap();
        assert_eq!(index, 1);
        assert_eq!(entry.offset, 10);
        assert!(dir.find(&mut storage, name(b'X', 0)).unwrap().is_none());
        dir.check(&mut storage).unwrap();
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let mut storage = MemoryStorage::new(64);
        let mut dir = Directory::format(&mut storage).unwrap();
        assert!(matches!(
            dir.create(&mut storage, name(0, 1)),
            Err(FsError::InvalidName)
        ));
    }

    #[test]
    fn test_create_until_full() {
        // 36 bytes: header 4, room for 3 entries only while file space stays empty
        let mut storage = MemoryStorage::new(36);
        let mut dir = Directory::format(&mut storage).unwrap();
        dir.create(&mut storage, name(b'A', 0)).unwrap();
        dir.create(&mut storage, name(b'A', 1)).unwrap();
        dir.create(&mut storage, name(b'A', 2)).unwrap();
        assert!(matches!(
            dir.create(&mut storage, name(b'A', 3)),
            Err(FsError::DirectoryFull)
        ));
        assert_eq!(dir.count(), 3);
    }

    #[test]
    fn test_remove_middle_compacts() {
        let mut storage = MemoryStorage::new(256);
        let mut dir = Directory::format(&mut storage).unwrap();
        add(&mut dir, &mut storage, name(b'A', 0), 4, 0xAA);
        add(&mut dir, &mut storage, name(b'B', 0), 3, 0xBB);
        add(&mut dir, &mut storage, name(b'C', 0), 2, 0xCC);

        let removed = dir.remove(&mut storage, 1).unwrap();
        assert_eq!(removed.name, name(b'B', 0));
        assert_eq!(dir.count(), 2);

        let entries = dir.entries(&mut storage).unwrap();
        assert_eq!(entries[0].name, name(b'A', 0));
        assert_eq!(entries[0].offset, 0);
        assert_eq!(entries[1].name, name(b'C', 0));
        assert_eq!(entries[1].offset, 4);
        assert_eq!(&storage.as_bytes()[..6], &[0xAA, 0xAA, 0xAA, 0xAA, 0xCC, 0xCC]);
        assert_eq!(dir.filespace_end(&mut storage).unwrap(), 6);
        dir.check(&mut storage).unwrap();
    }

    #[test]
    fn test_remove_last_entry() {
        let mut storage = MemoryStorage::new(128);
        let mut dir = Directory::format(&mut storage).unwrap();
        add(&mut dir, &mut storage, name(b'A', 0), 4, 1);
        add(&mut dir, &mut storage, name(b'B', 0), 4, 2);

        dir.remove(&mut storage, 1).unwrap();
        assert_eq!(dir.count(), 1);
        assert_eq!(dir.filespace_end(&mut storage).unwrap(), 4);
        assert_eq!(storage.as_bytes()[124], 1);
    }

    #[test]
    fn test_remove_zero_length() {
        let mut storage = MemoryStorage::new(128);
        let mut dir = Directory::format(&mut storage).unwrap();
        add(&mut dir, &mut storage, name(b'A', 0), 4, 1);
        dir.create(&mut storage, name(b'Z', 0)).unwrap();
        add(&mut dir, &mut storage, name(b'B', 0), 4, 2);

        dir.remove(&mut storage, 1).unwrap();
        let entries = dir.entries(&mut storage).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].offset, 4);
        dir.check(&mut storage).unwrap();
    }

    #[test]
    fn test_check_detects_gap() {
        let mut storage = MemoryStorage::new(128);
        let mut dir = Directory::format(&mut storage).unwrap();
        add(&mut dir, &mut storage, name(b'A', 0), 4, 1);
        let mut entry = dir.read_entry(&mut storage, 0).unwrap();
        entry.offset = 2;
        dir.write_entry(&mut storage, 0, &entry).unwrap();

        assert!(matches!(dir.check(&mut storage), Err(FsError::Corrupt(_))));
    }
}
