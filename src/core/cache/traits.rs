//! Cache backend trait definition.

use super::{CacheEntry, CacheStats, FileStamp};
use crate::error::CacheError;
use std::path::Path;

/// Trait for blur-score cache backends
///
/// Implementations must be internally synchronized: enrichment workers
/// read and write concurrently.
pub trait CacheBackend: Send + Sync {
    /// Get a cached score if it exists and is still valid
    ///
    /// The entry is only returned if the file hasn't been modified
    /// since it was cached. Stale entries are left for `set` to replace.
    fn get(&self, path: &Path, current: &FileStamp) -> Result<Option<CacheEntry>, CacheError>;

    /// Store a score in the cache, replacing any entry for the same path
    fn set(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Remove a specific entry
    fn remove(&self, path: &Path) -> Result<(), CacheError>;

    /// Clear all cached entries
    fn clear(&self) -> Result<(), CacheError>;

    /// Get cache statistics
    fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Remove entries for files that no longer exist
    ///
    /// Returns the number of entries removed.
    fn prune_orphans(&self) -> Result<usize, CacheError>;
}
