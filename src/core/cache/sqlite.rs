//! SQLite cache backend for blur scores that survive between sessions.

use super::{CacheBackend, CacheEntry, CacheStats, FileStamp};
use crate::error::CacheError;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::info;

/// SQLite-backed persistent score cache
///
/// Entries are validated one by one against the file's current stamp on
/// lookup; the cache is never invalidated wholesale.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteCache {
    /// Open or create a cache database at the given path
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| CacheError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        // WAL lets enrichment workers read while another writes
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blur_scores (
                path TEXT PRIMARY KEY,
                score REAL NOT NULL,
                file_size INTEGER NOT NULL,
                file_modified_ns INTEGER NOT NULL,
                cached_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    /// Open the cache and drop entries whose files are gone.
    pub fn open_with_prune(path: &Path) -> Result<Self, CacheError> {
        let cache = Self::open(path)?;
        let pruned = cache.prune_orphans()?;
        if pruned > 0 {
            info!("Pruned {} stale blur-score entries", pruned);
        }
        Ok(cache)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    fn to_timestamp(time: SystemTime) -> i64 {
        time.duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs() as i64
    }

    fn from_timestamp(timestamp: i64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(timestamp.max(0) as u64)
    }

    /// Modification times keep nanoseconds so a sub-second touch still
    /// invalidates. An i64 holds them until the year 2262.
    fn to_nanos(time: SystemTime) -> i64 {
        time.duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }

    fn from_nanos(nanos: i64) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(nanos.max(0) as u64)
    }
}

impl CacheBackend for SqliteCache {
    fn get(&self, path: &Path, current: &FileStamp) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.lock()?;
        let path_str = path.to_string_lossy();

        let result: Result<CacheEntry, _> = conn.query_row(
            "SELECT score, file_size, file_modified_ns, cached_at
             FROM blur_scores WHERE path = ?",
            [&path_str],
            |row| {
                Ok(CacheEntry {
                    path: path.to_path_buf(),
                    score: row.get(0)?,
                    file_size: row.get::<_, i64>(1)? as u64,
                    file_modified: Self::from_nanos(row.get(2)?),
                    cached_at: Self::from_timestamp(row.get(3)?),
                })
            },
        );

        match result {
            Ok(entry) if entry.is_valid_for(current) => Ok(Some(entry)),
            Ok(_) => Ok(None),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(CacheError::QueryFailed(e.to_string())),
        }
    }

    fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO blur_scores
             (path, score, file_size, file_modified_ns, cached_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                entry.path.to_string_lossy(),
                entry.score,
                entry.file_size as i64,
                Self::to_nanos(entry.file_modified),
                Self::to_timestamp(entry.cached_at),
            ],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM blur_scores WHERE path = ?",
            [&path.to_string_lossy()],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM blur_scores", [])
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.lock()?;

        let total_entries: usize = conn
            .query_row("SELECT COUNT(*) FROM blur_scores", [], |row| {
                row.get::<_, i64>(0).map(|v| v as usize)
            })
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let (oldest, newest): (Option<i64>, Option<i64>) = conn
            .query_row(
                "SELECT MIN(cached_at), MAX(cached_at) FROM blur_scores",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        Ok(CacheStats {
            total_entries,
            oldest_entry: oldest.map(Self::from_timestamp),
            newest_entry: newest.map(Self::from_timestamp),
        })
    }

    fn prune_orphans(&self) -> Result<usize, CacheError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare("SELECT path FROM blur_scores")
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        let paths: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        drop(stmt);

        let mut count = 0;
        for path in paths {
            if !Path::new(&path).exists() {
                conn.execute("DELETE FROM blur_scores WHERE path = ?", [&path])
                    .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
                count += 1;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stamp() -> FileStamp {
        FileStamp::new(
            1000,
            UNIX_EPOCH + Duration::from_secs(1_700_000_000) + Duration::from_nanos(123_456_789),
        )
    }

    #[test]
    fn sqlite_cache_creates_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("blur.db");

        let cache = SqliteCache::open(&db_path).unwrap();

        assert!(db_path.exists());
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn sqlite_cache_stores_and_retrieves() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("blur.db")).unwrap();
        let stamp = stamp();

        cache
            .set(CacheEntry::new(PathBuf::from("/test.jpg"), 812.25, stamp))
            .unwrap();

        let result = cache.get(Path::new("/test.jpg"), &stamp).unwrap();
        assert_eq!(result.unwrap().score, 812.25);
    }

    #[test]
    fn sqlite_cache_invalidates_on_modification() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("blur.db")).unwrap();
        let stamp = stamp();

        cache
            .set(CacheEntry::new(PathBuf::from("/test.jpg"), 1.0, stamp))
            .unwrap();

        let later = FileStamp::new(stamp.size, stamp.modified + Duration::from_secs(60));
        assert!(cache.get(Path::new("/test.jpg"), &later).unwrap().is_none());
    }

    #[test]
    fn sqlite_cache_invalidates_on_sub_second_touch() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("blur.db")).unwrap();
        let stamp = stamp();

        cache
            .set(CacheEntry::new(PathBuf::from("/test.jpg"), 1.0, stamp))
            .unwrap();

        let touched = FileStamp::new(stamp.size, stamp.modified + Duration::from_millis(300));
        assert!(cache.get(Path::new("/test.jpg"), &touched).unwrap().is_none());
        assert!(cache.get(Path::new("/test.jpg"), &stamp).unwrap().is_some());
    }

    #[test]
    fn sqlite_cache_persists_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("blur.db");
        let stamp = stamp();

        {
            let cache = SqliteCache::open(&db_path).unwrap();
            cache
                .set(CacheEntry::new(PathBuf::from("/a.jpg"), 1.0, stamp))
                .unwrap();
            cache
                .set(CacheEntry::new(PathBuf::from("/b.jpg"), 2.0, stamp))
                .unwrap();
        }

        let cache = SqliteCache::open(&db_path).unwrap();
        assert_eq!(cache.stats().unwrap().total_entries, 2);
        assert_eq!(
            cache.get(Path::new("/b.jpg"), &stamp).unwrap().unwrap().score,
            2.0
        );
    }

    #[test]
    fn sqlite_cache_clears_all() {
        let temp_dir = TempDir::new().unwrap();
        let cache = SqliteCache::open(&temp_dir.path().join("blur.db")).unwrap();

        cache
            .set(CacheEntry::new(PathBuf::from("/a.jpg"), 1.0, stamp()))
            .unwrap();
        cache.clear().unwrap();

        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }

    #[test]
    fn open_with_prune_drops_missing_files() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("blur.db");
        {
            let cache = SqliteCache::open(&db_path).unwrap();
            cache
                .set(CacheEntry::new(
                    PathBuf::from("/nonexistent/gone.cr2"),
                    1.0,
                    stamp(),
                ))
                .unwrap();
        }

        let cache = SqliteCache::open_with_prune(&db_path).unwrap();
        assert_eq!(cache.stats().unwrap().total_entries, 0);
    }
}
