//! Plan generator for exports.

use super::types::*;
use crate::core::group::PhotoGroup;
use crate::core::session::CullingSession;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Derives export plans from a session's selection
pub struct ExportPlanner;

impl ExportPlanner {
    /// Plan the export of every selected group.
    ///
    /// Pure: reads the session and config, touches nothing on disk. The same
    /// selection and config always give an equal plan.
    pub fn plan(session: &CullingSession, config: &ExportConfig) -> ExportPlan {
        Self::plan_groups(session.selected(), config)
    }

    /// Plan an export for an explicit list of groups.
    ///
    /// Unselected groups are skipped. Copies come first; darktable
    /// registrations follow them, one per group, and are carried out
    /// together as a single darktable call.
    pub fn plan_groups<'a>(
        groups: impl IntoIterator<Item = &'a PhotoGroup>,
        config: &ExportConfig,
    ) -> ExportPlan {
        let mut actions = Vec::new();
        let mut registrations = Vec::new();
        let mut group_count = 0;

        for group in groups {
            if !group.decision().is_selected() {
                continue;
            }
            group_count += 1;
            let files = group.files();

            for target in &config.backup_targets {
                for source in files.paths() {
                    actions.push(PlannedAction {
                        group_id: group.id().clone(),
                        action: ExportAction::CopyTo {
                            target: target.clone(),
                            source: source.to_path_buf(),
                            destination: Self::destination(target, files.relative_dir(), source),
                        },
                    });
                }
            }

            if config.darktable_enabled {
                registrations.push(PlannedAction {
                    group_id: group.id().clone(),
                    action: ExportAction::RegisterWithDarktable {
                        paths: files.paths().into_iter().map(Path::to_path_buf).collect(),
                    },
                });
            }
        }
        actions.append(&mut registrations);

        debug!(
            "Planned {} actions for {} selected groups",
            actions.len(),
            group_count
        );

        ExportPlan {
            actions,
            targets: config.backup_targets.clone(),
            group_count,
        }
    }

    /// `<target>/<relative dir>/<file name>`
    fn destination(target: &Path, relative_dir: &Path, source: &Path) -> PathBuf {
        let mut destination = target.join(relative_dir);
        if let Some(name) = source.file_name() {
            destination.push(name);
        }
        destination
    }
}
