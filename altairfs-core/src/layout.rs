//! On-storage layout.
//!
//! The region is laid out as:
//! - `[0, filespace_end)`: file payloads, packed with no gaps
//! - directory entries growing down from the header, entry `i` at
//!   `capacity - 4 - (i + 1) * 8`
//! - last 4 bytes: `[count:1][signature:3]`
//!
//! Entry layout (8 bytes, little endian):
//! - Byte 0: name1 (never 0 for a stored entry)
//! - Byte 1: name2
//! - Bytes 2-3: length
//! - Bytes 4-7: offset

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{FsError, FsResult};

/// Size of the `[count][signature]` header at the top of the region.
pub const HEADER_SIZE: u32 = 4;

/// Size of one directory entry.
pub const ENTRY_SIZE: u32 = 8;

/// Most entries the one-byte count can describe.
pub const MAX_ENTRIES: usize = u8::MAX as usize;

/// Signature of a region written by the current format.
pub const SIGNATURE_CURRENT: [u8; 3] = *b"AF2";

/// Signature of a region that still needs migrating.
pub const SIGNATURE_LEGACY: [u8; 3] = *b"AF1";

/// What the header signature says about a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    Current,
    Legacy,
    Unknown,
}

impl Signature {
    pub fn detect(bytes: [u8; 3]) -> Self {
        match bytes {
            SIGNATURE_CURRENT => Signature::Current,
            SIGNATURE_LEGACY => Signature::Legacy,
            _ => Signature::Unknown,
        }
    }
}

/// Offset of the header.
pub fn header_offset(capacity: u32) -> u32 {
    capacity - HEADER_SIZE
}

/// Offset of directory entry `index`.
pub fn entry_offset(capacity: u32, index: usize) -> u32 {
    capacity - HEADER_SIZE - (index as u32 + 1) * ENTRY_SIZE
}

/// First byte not available for payload when the directory holds `count` entries.
pub fn dir_start(capacity: u32, count: usize) -> u32 {
    capacity - HEADER_SIZE - count as u32 * ENTRY_SIZE
}

/// Two-byte file identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileName {
    pub name1: u8,
    pub name2: u8,
}

impl FileName {
    pub const fn new(name1: u8, name2: u8) -> Self {
        Self { name1, name2 }
    }

    /// Stored entries always have a nonzero first byte.
    pub fn is_valid(&self) -> bool {
        self.name1 != 0
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_tag(self.name1)
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.name1.is_ascii_graphic() {
            self.name1 as char
        } else {
            '?'
        };
        write!(f, "{}{:02X}", tag, self.name2)
    }
}

/// Parse `<tag char><hex byte>`, e.g. `D01` or `MFF`.
///
/// ```
/// use altairfs_core::FileName;
/// let name: FileName = "D01".parse().unwrap();
/// assert_eq!(name, FileName::new(b'D', 1));
/// assert_eq!(name.to_string(), "D01");
/// ```
impl FromStr for FileName {
    type Err = FsError;

    fn from_str(s: &str) -> FsResult<Self> {
        let mut chars = s.chars();
        let tag = chars.next().ok_or(FsError::InvalidName)?;
        if !tag.is_ascii_graphic() {
            return Err(FsError::InvalidName);
        }
        let number = chars.as_str();
        if number.is_empty() || number.len() > 2 {
            return Err(FsError::InvalidName);
        }
        let name2 = u8::from_str_radix(number, 16).map_err(|_| FsError::InvalidName)?;
        Ok(FileName::new(tag as u8, name2))
    }
}

impl Serialize for FileName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Conventional meaning of `name1` as used by the emulator's subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Saved configuration
    Config,
    /// Memory page snapshot
    MemoryPage,
    /// Captured serial ("tape") data
    CapturedData,
    /// BASIC program image
    BasicProgram,
    Other(u8),
}

impl FileKind {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            b'C' => FileKind::Config,
            b'M' => FileKind::MemoryPage,
            b'D' => FileKind::CapturedData,
            b'B' => FileKind::BasicProgram,
            other => FileKind::Other(other),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FileKind::Config => "Configuration",
            FileKind::MemoryPage => "Memory page",
            FileKind::CapturedData => "Captured data",
            FileKind::BasicProgram => "BASIC program",
            FileKind::Other(_) => "Unknown",
        }
    }
}

/// A persisted directory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: FileName,
    pub length: u16,
    pub offset: u32,
}

impl DirEntry {
    pub fn new(name: FileName, offset: u32) -> Self {
        Self {
            name,
            length: 0,
            offset,
        }
    }

    /// One past the last payload byte. Saturates for offsets no valid region has.
    pub fn end(&self) -> u32 {
        self.offset.saturating_add(self.length as u32)
    }

    pub fn encode(&self) -> [u8; ENTRY_SIZE as usize] {
        let mut raw = [0u8; ENTRY_SIZE as usize];
        raw[0] = self.name.name1;
        raw[1] = self.name.name2;
        raw[2..4].copy_from_slice(&self.length.to_le_bytes());
        raw[4..8].copy_from_slice(&self.offset.to_le_bytes());
        raw
    }

    pub fn decode(raw: &[u8; ENTRY_SIZE as usize]) -> Self {
        Self {
            name: FileName::new(raw[0], raw[1]),
            length: u16::from_le_bytes([raw[2], raw[3]]),
            offset: u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]),
        }
    }
}
