//! Mounting and legacy-format migration.
//!
//! Mount reads the header signature once:
//! - current signature: the region is ready to use
//! - legacy signature: its files must be copied out with `LegacyVolume::migrate_into`
//! - anything else: a fresh empty directory is written

use log::{debug, info, warn};

use crate::config::FsConfig;
use crate::directory::Directory;
use crate::error::{FsError, FsResult};
use crate::filesystem::FileSystem;
use crate::layout::{DirEntry, Signature};
use crate::sink::FileSink;
use crate::storage::Storage;

/// Bytes copied per step during migration.
pub const MIGRATION_CHUNK: usize = 128;

/// Outcome of mounting a region.
pub enum Mount<S: Storage> {
    Ready(FileSystem<S>),
    Legacy(LegacyVolume<S>),
}

/// Detect the region's format and mount it, formatting a region with no signature.
pub fn mount<S: Storage>(storage: S, config: FsConfig) -> FsResult<Mount<S>> {
    mount_region(storage, config, true)
}

/// Like `mount`, but a region with no signature is an error and is left untouched.
pub fn mount_existing<S: Storage>(storage: S, config: FsConfig) -> FsResult<Mount<S>> {
    mount_region(storage, config, false)
}

fn mount_region<S: Storage>(
    mut storage: S,
    config: FsConfig,
    format: bool,
) -> FsResult<Mount<S>> {
    config.validate()?;
    let (signature, dir) = Directory::load(&mut storage)?;
    match signature {
        Signature::Current => {
            info!("mounted region with {} files", dir.count());
            Ok(Mount::Ready(FileSystem::with_directory(storage, dir, config)))
        }
        Signature::Legacy => {
            info!("region holds {} files in the legacy format", dir.count());
            Ok(Mount::Legacy(LegacyVolume { storage, dir }))
        }
        Signature::Unknown if !format => {
            warn!("no file system signature found");
            Err(FsError::Unformatted)
        }
        Signature::Unknown => {
            info!("no file system signature found, formatting");
            let dir = Directory::format(&mut storage)?;
            Ok(Mount::Ready(FileSystem::with_directory(storage, dir, config)))
        }
    }
}

impl<S: Storage> FileSystem<S> {
    /// Mount a region that must already be (or become) the current format.
    pub fn mount(storage: S, config: FsConfig) -> FsResult<Self> {
        match mount(storage, config)? {
            Mount::Ready(fs) => Ok(fs),
            Mount::Legacy(_) => Err(FsError::NotMigrated),
        }
    }

    /// Mount a region that must already hold the current format. Never writes.
    pub fn mount_existing(storage: S, config: FsConfig) -> FsResult<Self> {
        match mount_existing(storage, config)? {
            Mount::Ready(fs) => Ok(fs),
            Mount::Legacy(_) => Err(FsError::NotMigrated),
        }
    }
}

/// Files copied by a successful migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub files: usize,
    pub bytes: u64,
}

/// A region in the legacy layout, readable only for migration.
pub struct LegacyVolume<S: Storage> {
    storage: S,
    dir: Directory,
}

impl<S: Storage> LegacyVolume<S> {
    pub fn entries(&mut self) -> FsResult<Vec<DirEntry>> {
        self.dir.entries(&mut self.storage)
    }

    /// Copy every legacy file into `sink`, then invalidate the region.
    ///
    /// Nothing is written to the region until every copy has succeeded, so a
    /// failed migration simply runs again in full on the next mount.
    pub fn migrate_into<K: FileSink>(&mut self, sink: &mut K) -> FsResult<MigrationReport> {
        self.dir.check(&mut self.storage)?;
        let entries = self.entries()?;

        let mut report = MigrationReport::default();
        for entry in &entries {
            self.copy_entry(entry, sink)?;
            report.files += 1;
            report.bytes += entry.length as u64;
        }

        self.storage.invalidate()?;
        info!(
            "migrated {} files ({} bytes), legacy region invalidated",
            report.files, report.bytes
        );
        Ok(report)
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn copy_entry<K: FileSink>(&mut self, entry: &DirEntry, sink: &mut K) -> FsResult<()> {
        debug!("migrating {} ({} bytes)", entry.name, entry.length);
        let mut handle = sink.open_write(entry.name)?;
        let mut chunk = [0u8; MIGRATION_CHUNK];
        let mut copied = 0u32;
        let length = entry.length as u32;

        while copied < length {
            let n = (length - copied).min(MIGRATION_CHUNK as u32) as usize;
            let step = self
                .storage
                .read(entry.offset + copied, &mut chunk[..n])
                .and_then(|()| sink.write_data(&mut handle, &chunk[..n]));
            if let Err(e) = step {
                warn!("migration of {} failed: {}", entry.name, e);
                if let Err(close) = sink.close(handle) {
                    warn!("could not close {} after failure: {}", entry.name, close);
                }
                return Err(e);
            }
            copied += n as u32;
        }
        sink.close(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FileName, SIGNATURE_LEGACY};
    use crate::sink::MemorySink;
    use crate::storage::MemoryStorage;

    fn legacy_region() -> MemoryStorage {
        let mut fs =
            FileSystem::format(MemoryStorage::new(1024), FsConfig::default()).unwrap();
        fs.write_whole_file(FileName::new(b'C', 0), b"config").unwrap();
        fs.write_whole_file(FileName::new(b'D', 1), &[0x55; 300]).unwrap();
        let mut storage = fs.into_storage();
        storage.write(1021, &SIGNATURE_LEGACY).unwrap();
        storage
    }

    #[test]
    fn test_mount_fresh_region_formats() {
        let fs = FileSystem::mount(MemoryStorage::new(128), FsConfig::default()).unwrap();
        assert_eq!(fs.dir_start(), 124);
        assert_eq!(&fs.storage().as_bytes()[124..], &[0, b'A', b'F', b'2']);
    }

    #[test]
    fn test_mount_current_keeps_files() {
        let mut fs = FileSystem::format(MemoryStorage::new(256), FsConfig::default()).unwrap();
        fs.write_whole_file(FileName::new(b'B', 0), b"10 END").unwrap();

        let mut fs = FileSystem::mount(fs.into_storage(), FsConfig::default()).unwrap();
        assert_eq!(fs.read_file(FileName::new(b'B', 0)).unwrap(), b"10 END");
    }

    #[test]
    fn test_mount_existing_leaves_foreign_region_alone() {
        let mut bytes = vec![b'.'; 60];
        bytes.extend_from_slice(b"END\n");
        let mut storage = MemoryStorage::from_bytes(bytes.clone()).unwrap();

        assert!(matches!(
            FileSystem::mount_existing(&mut storage, FsConfig::default()),
            Err(FsError::Unformatted)
        ));
        assert!(matches!(
            mount_existing(&mut storage, FsConfig::default()),
            Err(FsError::Unformatted)
        ));
        assert_eq!(storage.as_bytes(), &bytes[..]);
    }

    #[test]
    fn test_mount_existing_accepts_both_formats() {
        let mut fs = FileSystem::format(MemoryStorage::new(256), FsConfig::default()).unwrap();
        fs.write_whole_file(FileName::new(b'B', 0), b"10 END").unwrap();
        let mut fs = FileSystem::mount_existing(fs.into_storage(), FsConfig::default()).unwrap();
        assert_eq!(fs.read_file(FileName::new(b'B', 0)).unwrap(), b"10 END");

        assert!(matches!(
            mount_existing(legacy_region(), FsConfig::default()).unwrap(),
            Mount::Legacy(_)
        ));
    }

    #[test]
    fn test_legacy_requires_migration() {
        assert!(matches!(
            FileSystem::mount(legacy_region(), FsConfig::default()),
            Err(FsError::NotMigrated)
        ));
    }

    #[test]
    fn test_migrate_copies_and_invalidates() {
        let Mount::Legacy(mut legacy) = mount(legacy_region(), FsConfig::default()).unwrap()
        else {
            panic!("expected legacy mount");
        };
        assert_eq!(legacy.entries().unwrap().len(), 2);

        let mut sink = MemorySink::new();
        let report = legacy.migrate_into(&mut sink).unwrap();
        assert_eq!(report, MigrationReport { files: 2, bytes: 306 });
        assert_eq!(sink.read_file(FileName::new(b'C', 0)), Some(&b"config"[..]));
        assert_eq!(sink.read_file(FileName::new(b'D', 1)), Some(&[0x55; 300][..]));

        // invalidated: the next mount formats instead of migrating again
        let fs = FileSystem::mount(legacy.into_storage(), FsConfig::default()).unwrap();
        assert_eq!(fs.dir_start(), 1020);
    }
}
