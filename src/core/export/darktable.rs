//! Darktable registration and the ledger that makes it idempotent.

use crate::error::CacheError;
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Hands files to darktable
pub trait DarktableRegistrar: Send + Sync {
    fn register(&self, paths: &[PathBuf]) -> io::Result<()>;
}

/// Launches the darktable executable with the files as arguments
#[derive(Debug, Clone)]
pub struct CommandRegistrar {
    executable: PathBuf,
}

impl CommandRegistrar {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Whether `<executable> --version` runs successfully
    pub fn is_available(&self) -> bool {
        Command::new(&self.executable)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl Default for CommandRegistrar {
    fn default() -> Self {
        Self::new("darktable")
    }
}

impl DarktableRegistrar for CommandRegistrar {
    fn register(&self, paths: &[PathBuf]) -> io::Result<()> {
        info!(
            "Opening {} file(s) in {}",
            paths.len(),
            self.executable.display()
        );
        // darktable keeps running after import; it is not waited on.
        Command::new(&self.executable)
            .args(paths)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }
}

/// Remembers which files were already handed to darktable
pub trait RegistrationLedger: Send + Sync {
    fn is_registered(&self, path: &Path) -> Result<bool, CacheError>;

    fn record(&self, paths: &[PathBuf]) -> Result<(), CacheError>;

    /// The paths not yet registered, in their original order
    fn unregistered(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, CacheError> {
        let mut missing = Vec::new();
        for path in paths {
            if !self.is_registered(path)? {
                missing.push(path.clone());
            }
        }
        Ok(missing)
    }
}

/// Ledger for a single run
#[derive(Default)]
pub struct InMemoryLedger {
    paths: RwLock<HashSet<PathBuf>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrationLedger for InMemoryLedger {
    fn is_registered(&self, path: &Path) -> Result<bool, CacheError> {
        let paths = self
            .paths
            .read()
            .map_err(|e| CacheError::QueryFailed(format!("Lock poisoned: {}", e)))?;
        Ok(paths.contains(path))
    }

    fn record(&self, new_paths: &[PathBuf]) -> Result<(), CacheError> {
        let mut paths = self
            .paths
            .write()
            .map_err(|e| CacheError::QueryFailed(format!("Lock poisoned: {}", e)))?;
        paths.extend(new_paths.iter().cloned());
        Ok(())
    }
}

/// Ledger persisted in SQLite, shared across runs
pub struct SqliteLedger {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteLedger {
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

        conn.execute(
            "CREATE TABLE IF NOT EXISTS registrations (
                path TEXT PRIMARY KEY,
                registered_at INTEGER NOT NULL
            )",
            [],
        )
        .map_err(|e| CacheError::QueryFailed(e.to_string()))?;

        debug!("Opened darktable ledger at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::Corrupted {
            path: self.db_path.clone(),
        })
    }
}

impl RegistrationLedger for SqliteLedger {
    fn is_registered(&self, path: &Path) -> Result<bool, CacheError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM registrations WHERE path = ?",
                [path.to_string_lossy()],
                |row| row.get(0),
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        Ok(count > 0)
    }

    fn record(&self, paths: &[PathBuf]) -> Result<(), CacheError> {
        let mut conn = self.lock()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let tx = conn
            .transaction()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        for path in paths {
            tx.execute(
                "INSERT OR REPLACE INTO registrations (path, registered_at) VALUES (?, ?)",
                params![path.to_string_lossy(), now],
            )
            .map_err(|e| CacheError::QueryFailed(e.to_string()))?;
        }
        tx.commit()
            .map_err(|e| CacheError::QueryFailed(e.to_string()))
    }
}
