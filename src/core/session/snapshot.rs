//! Session snapshots and the session file.

use crate::core::group::{Decision, GroupId};
use crate::error::PersistError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Current session file format version
pub const SNAPSHOT_VERSION: u32 = 1;

const SESSION_DIR: &str = ".photo-cull";
const SESSION_FILE: &str = "session.json";

/// Decisions of a session, keyed by group id.
///
/// Undecided groups are omitted. Blur scores and metadata are recomputed
/// on the next run and never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    pub version: u32,
    /// Group under the cursor when the snapshot was taken
    pub cursor_group: Option<GroupId>,
    pub decisions: BTreeMap<GroupId, Decision>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            cursor_group: None,
            decisions: BTreeMap::new(),
        }
    }
}

/// Reads and writes a snapshot as JSON
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<root>/.photo-cull/session.json`
    pub fn for_root(root: &Path) -> Self {
        Self::new(Self::default_path(root))
    }

    pub fn default_path(root: &Path) -> PathBuf {
        root.join(SESSION_DIR).join(SESSION_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot; `Ok(None)` if no session file exists yet.
    pub fn load(&self) -> Result<Option<SessionSnapshot>, PersistError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No session file at {}", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(PersistError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let snapshot: SessionSnapshot =
            serde_json::from_str(&contents).map_err(|e| PersistError::Malformed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        if snapshot.version > SNAPSHOT_VERSION {
            debug!(
                "Session file version {} is newer than {}; reading what we understand",
                snapshot.version, SNAPSHOT_VERSION
            );
        }
        Ok(Some(snapshot))
    }

    /// Write the snapshot atomically: a temp file in the same directory is
    /// renamed over the session file.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistError> {
        let io_error = |source: io::Error| PersistError::Io {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(io_error)?;

        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| PersistError::Malformed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(io_error)?;
        temp.write_all(&json).map_err(io_error)?;
        temp.as_file().sync_all().map_err(io_error)?;
        temp.persist(&self.path).map_err(|e| io_error(e.error))?;

        info!(
            "Saved {} decisions to {}",
            snapshot.decisions.len(),
            self.path.display()
        );
        Ok(())
    }
}
