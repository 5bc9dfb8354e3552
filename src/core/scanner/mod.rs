//! # Scanner Module
//!
//! Discovers RAW and JPEG files under a shoot directory and pairs them into
//! [`PhotoGroup`](crate::core::group::PhotoGroup)s.
//!
//! ## Grouping
//! Files are grouped by `(relative directory, basename)`. `IMG_001.CR2` and
//! `IMG_001.JPG` in the same folder become one group; the same basename in
//! two different folders yields two groups.
//!
//! ## Example
//! ```rust,ignore
//! use photo_cull::core::scanner::{ScanConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let result = scanner.scan(Path::new("/shoots/2024-06-01"))?;
//! for group in &result.groups {
//!     println!("{}", group.id());
//! }
//! ```

mod filter;
mod grouping;
mod walker;

pub use filter::{ExtensionFilter, FileKind};
pub use walker::{ScanConfig, WalkDirScanner};

use crate::core::group::GroupFiles;
use crate::error::ScanError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A non-fatal problem found while scanning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanWarning {
    /// A file or directory could not be read and was skipped
    Unreadable { path: PathBuf, reason: String },
    /// Another file of the same kind already claimed this basename
    DuplicateCandidate { path: PathBuf, kept: PathBuf },
}

impl ScanWarning {
    pub fn path(&self) -> &Path {
        match self {
            ScanWarning::Unreadable { path, .. } | ScanWarning::DuplicateCandidate { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanWarning::Unreadable { path, reason } => {
                write!(f, "skipped unreadable {}: {}", path.display(), reason)
            }
            ScanWarning::DuplicateCandidate { path, kept } => {
                write!(f, "ignored {} (kept {})", path.display(), kept.display())
            }
        }
    }
}

/// Result of a scan operation
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// The scanned root directory
    pub root: PathBuf,
    /// Groups ordered by basename, then relative directory
    pub groups: Vec<GroupFiles>,
    /// Problems that did not stop the scan
    pub warnings: Vec<ScanWarning>,
    /// Number of RAW and JPEG files classified
    pub files_found: usize,
}

/// Trait for photo scanners
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait PhotoScanner: Send + Sync {
    /// Scan a directory tree and group what it finds
    fn scan(&self, root: &Path) -> Result<ScanResult, ScanError>;

    /// Scan with progress reporting via events
    fn scan_with_events(&self, root: &Path, events: &EventSender)
        -> Result<ScanResult, ScanError>;
}
