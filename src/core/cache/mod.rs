//! # Cache Module
//!
//! Validity-keyed caching for values derived from photo files.
//!
//! Every derived value (blur score, metadata) is stored together with the
//! [`FileStamp`] of the file it came from. A value is reused only while the
//! file still has the same size and modification time; checking the stamp,
//! not mere presence, is what gates recomputation.
//!
//! ## Backends for blur scores
//! - `InMemoryCache` - one culling session
//! - `SqliteCache` - persistent across sessions, invalidated per entry

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryCache;
pub use sqlite::SqliteCache;
pub use traits::CacheBackend;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of a file's content for cache validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
}

impl FileStamp {
    pub fn new(size: u64, modified: SystemTime) -> Self {
        Self { size, modified }
    }

    /// Read the current stamp of a file
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
        })
    }

    /// Whether two stamps describe the same file content.
    ///
    /// Timestamps compare at full precision; any touch invalidates.
    pub fn matches(&self, other: &FileStamp) -> bool {
        self.size == other.size && self.modified == other.modified
    }
}

/// A value computed from a file, with the stamp it was computed against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cached<T> {
    pub value: T,
    /// File the value was derived from
    pub source: PathBuf,
    pub stamp: FileStamp,
}

impl<T> Cached<T> {
    pub fn new(value: T, source: PathBuf, stamp: FileStamp) -> Self {
        Self {
            value,
            source,
            stamp,
        }
    }

    /// Check if this value is still valid for the file's current stamp
    pub fn is_valid_for(&self, current: &FileStamp) -> bool {
        self.stamp.matches(current)
    }

    /// Re-stat the source file and check validity.
    ///
    /// A file that can no longer be read is treated as changed.
    pub fn is_fresh(&self) -> bool {
        FileStamp::of(&self.source)
            .map(|current| self.is_valid_for(&current))
            .unwrap_or(false)
    }
}

/// A cached blur score entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Path of the file the preview was decoded from
    pub path: PathBuf,
    /// The computed sharpness score
    pub score: f64,
    /// File size at time of scoring
    pub file_size: u64,
    /// File modification time at time of scoring
    pub file_modified: SystemTime,
    /// When the entry was cached
    pub cached_at: SystemTime,
}

impl CacheEntry {
    pub fn new(path: PathBuf, score: f64, stamp: FileStamp) -> Self {
        Self {
            path,
            score,
            file_size: stamp.size,
            file_modified: stamp.modified,
            cached_at: SystemTime::now(),
        }
    }

    pub fn stamp(&self) -> FileStamp {
        FileStamp::new(self.file_size, self.file_modified)
    }

    /// Check if this entry is still valid for a file
    pub fn is_valid_for(&self, current: &FileStamp) -> bool {
        self.stamp().matches(current)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Oldest entry timestamp
    pub oldest_entry: Option<SystemTime>,
    /// Newest entry timestamp
    pub newest_entry: Option<SystemTime>,
}
