//! Error types for the storage file system.

use thiserror::Error;

use crate::layout::FileName;

/// Errors that can occur while operating on the storage region.
///
/// None of these are fatal: the caller decides whether to tell the user,
/// retry with a different file id, or carry on without persistence.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("File not found: {0}")]
    NotFound(FileName),

    #[error("Invalid file name")]
    InvalidName,

    #[error("Directory full")]
    DirectoryFull,

    #[error("Disk full")]
    DiskFull,

    #[error("File too large")]
    FileTooLarge,

    #[error("Another file is already open")]
    HandlesBusy,

    #[error("No free file handle")]
    NoFreeHandle,

    #[error("Invalid file handle: {0}")]
    InvalidHandle(u8),

    #[error("Operation not valid for this handle's mode")]
    WrongMode,

    #[error("Seek position {pos} outside file of length {len}")]
    SeekOutOfRange { pos: u32, len: u32 },

    #[error("Range {offset}+{len} outside storage of {capacity} bytes")]
    OutOfBounds { offset: u32, len: u32, capacity: u32 },

    #[error("Corrupt file system: {0}")]
    Corrupt(String),

    #[error("Storage holds no file system")]
    Unformatted,

    #[error("Storage holds a legacy layout that must be migrated first")]
    NotMigrated,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for file system operations.
pub type FsResult<T> = Result<T, FsError>;
