//! Altair emulator storage file system
//!
//! This crate provides the persistence layer the emulator uses when the host
//! has no native filesystem: a single-level, compacting file system on a flat,
//! fixed-capacity byte region.
//! - Named two-byte files (configs, captured serial data, BASIC programs, memory pages)
//! - Contiguous allocation with compaction on delete
//! - Buffered sequential writes, seekable reads
//! - Migration of regions written in the legacy format
//!
//! # Architecture
//!
//! The engine uses a layered design:
//! - `Storage` trait: the raw region (memory, image file, flash...)
//! - `Directory`: the packed entry array at the top of the region
//! - `FileSystem`: handle table and file API over a `Storage`
//! - `FileSink` trait: destination for migrated or exported files
//!
//! ```
//! use altairfs_core::{FileName, FileSystem, FsConfig, MemoryStorage};
//!
//! let mut fs = FileSystem::mount(MemoryStorage::new(1024), FsConfig::default()).unwrap();
//! let name = FileName::new(b'D', 1);
//! fs.write_whole_file(name, b"captured").unwrap();
//!
//! let mut buf = [0u8; 16];
//! let n = fs.read_whole_file(name, &mut buf).unwrap();
//! assert_eq!(&buf[..n], b"captured");
//! ```

pub mod archive;
pub mod config;
pub mod directory;
pub mod error;
pub mod filesystem;
pub mod handle;
pub mod layout;
mod listing;
pub mod mount;
pub mod sink;
pub mod storage;

pub use archive::{export_zip, import_zip, ArchiveEntry, ArchiveManifest};
pub use config::FsConfig;
pub use directory::Directory;
pub use error::{FsError, FsResult};
pub use filesystem::{FileSystem, SpaceUsage, WRITE_EOF_SLACK};
pub use handle::{FileId, OpenMode};
pub use layout::{DirEntry, FileKind, FileName};
pub use mount::{mount, mount_existing, LegacyVolume, MigrationReport, Mount};
pub use sink::{host_file_name, parse_host_file_name, FileSink, MemorySink};
pub use storage::{FileStorage, MemoryStorage, Storage};
