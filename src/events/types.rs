//! Event type definitions for progress and change notifications.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the culling engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Scanning phase events
    Scan(ScanEvent),
    /// Background metadata / blur enrichment
    Enrich(EnrichEvent),
    /// Culling session state changes
    Session(SessionEvent),
    /// Export execution events
    Export(ExportEvent),
}

/// Events during the scanning phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { root: PathBuf },
    /// Progress update during scanning
    Progress(ScanProgress),
    /// A file was skipped but scanning continues
    Warning { path: PathBuf, message: String },
    /// Scanning completed
    Completed { total_groups: usize, total_files: usize },
}

/// Progress information during scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories visited so far
    pub directories_scanned: usize,
    /// Number of RAW/JPEG files classified so far
    pub files_found: usize,
    /// Directory being scanned
    pub current_path: PathBuf,
}

/// Events from the enrichment worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EnrichEvent {
    /// Metadata for a group is available
    MetadataReady { group_id: String, fields: usize },
    /// A blur score was computed
    BlurScored { group_id: String, score: f64 },
    /// A blur score was served from the cache
    CacheHit { group_id: String },
    /// A task was cancelled before doing any work
    Cancelled { group_id: String },
    /// Enrichment failed for one group; the group stays "pending"
    Error { group_id: String, message: String },
}

/// Session state changes, for status panels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// The cursor moved
    CursorMoved { index: usize, group_id: String },
    /// A decision changed
    DecisionChanged {
        group_id: String,
        rating: u8,
        rejected: bool,
    },
    /// Decisions were restored from a snapshot
    Restored { applied: usize, dropped: usize },
    /// Enrichment data was merged into a group
    Enriched { group_id: String },
}

/// Events during export execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExportEvent {
    /// Execution has started
    Started { total_actions: usize },
    /// One action finished
    ActionFinished {
        completed: usize,
        total: usize,
        group_id: String,
        outcome: String,
    },
    /// Execution completed
    Completed {
        succeeded: usize,
        skipped: usize,
        failed: usize,
    },
}
