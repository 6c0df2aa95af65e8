//! Runtime configuration for a mounted file system.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

/// Default number of handle slots.
pub const DEFAULT_MAX_OPEN_FILES: usize = 3;

/// Default size of the write coalescing buffer in bytes.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64;

/// File system tunables.
///
/// Loaded from JSON, e.g.
/// ```
/// use altairfs_core::FsConfig;
/// let config = FsConfig::from_json(r#"{ "maxOpenFiles": 2, "writeBufferSize": 0 }"#).unwrap();
/// assert_eq!(config.max_open_files, 2);
/// assert!(config.exclusive_open);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FsConfig {
    /// Number of slots in the handle table.
    pub max_open_files: usize,
    /// Bytes of write coalescing buffer; 0 writes straight through.
    pub write_buffer_size: usize,
    /// When set, no file may be opened while any other handle is open.
    /// When clear, readers may share the table but writers stay exclusive.
    pub exclusive_open: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            exclusive_open: true,
        }
    }
}

impl FsConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> FsResult<Self> {
        let config: FsConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> FsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check that the values can back a handle table.
    pub fn validate(&self) -> FsResult<()> {
        if self.max_open_files == 0 || self.max_open_files > u8::MAX as usize {
            return Err(FsError::Config(format!(
                "maxOpenFiles must be between 1 and 255, got {}",
                self.max_open_files
            )));
        }
        if self.write_buffer_size > u16::MAX as usize {
            return Err(FsError::Config(format!(
                "writeBufferSize must not exceed {}, got {}",
                u16::MAX,
                self.write_buffer_size
            )));
        }
        Ok(())
    }
}
