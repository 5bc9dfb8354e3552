//! Types for the export module.

use crate::core::group::GroupId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for export planning and execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Roots that selected files are copied into, in order
    pub backup_targets: Vec<PathBuf>,
    /// Compare xxh3 checksums, not just sizes, before skipping a copy
    pub verify_checksum: bool,
    /// Register selected groups with darktable
    pub darktable_enabled: bool,
}

/// One side effect of an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportAction {
    /// Copy one file into a backup target
    CopyTo {
        target: PathBuf,
        source: PathBuf,
        destination: PathBuf,
    },
    /// Hand all files of a group to darktable; the executor batches these
    RegisterWithDarktable { paths: Vec<PathBuf> },
}

impl ExportAction {
    pub fn describe(&self) -> String {
        match self {
            ExportAction::CopyTo { destination, .. } => format!("copy to {}", destination.display()),
            ExportAction::RegisterWithDarktable { paths } => {
                format!("register {} file(s) with darktable", paths.len())
            }
        }
    }
}

/// An action together with the group it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub group_id: GroupId,
    pub action: ExportAction,
}

/// Everything an export will do, derived from the session's selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportPlan {
    pub actions: Vec<PlannedAction>,
    /// Targets that must be writable before any action runs
    pub targets: Vec<PathBuf>,
    /// Number of selected groups the plan covers
    pub group_count: usize,
}

impl ExportPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn copy_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a.action, ExportAction::CopyTo { .. }))
            .count()
    }

    pub fn needs_darktable(&self) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a.action, ExportAction::RegisterWithDarktable { .. }))
    }
}

/// Result of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Succeeded,
    /// The effect was already in place
    SkippedAlreadyDone,
    Failed { reason: String },
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Succeeded => write!(f, "succeeded"),
            ActionOutcome::SkippedAlreadyDone => write!(f, "skipped (already done)"),
            ActionOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

/// An executed action and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReport {
    pub group_id: GroupId,
    pub action: ExportAction,
    pub outcome: ActionOutcome,
}

/// Result of executing a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub actions: Vec<ActionReport>,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ExecutionReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Every action was already done
    pub fn is_noop(&self) -> bool {
        self.succeeded == 0 && self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionReport> {
        self.actions
            .iter()
            .filter(|a| matches!(a.outcome, ActionOutcome::Failed { .. }))
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
