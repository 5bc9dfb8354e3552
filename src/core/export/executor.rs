//! Executor for export plans.

use super::darktable::{DarktableRegistrar, InMemoryLedger, RegistrationLedger};
use super::types::*;
use crate::core::preview::read_file_bytes;
use crate::error::ExportError;
use crate::events::{null_sender, Event, EventSender, ExportEvent};
use chrono::Utc;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

/// Runs export plans.
///
/// Every action checks whether its effect is already in place before acting,
/// so executing the same plan twice is safe: the second run only skips.
#[derive(Clone)]
pub struct ExportExecutor {
    verify_checksum: bool,
    registrar: Option<Arc<dyn DarktableRegistrar>>,
    ledger: Arc<dyn RegistrationLedger>,
    events: EventSender,
}

impl ExportExecutor {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            verify_checksum: config.verify_checksum,
            registrar: None,
            ledger: Arc::new(InMemoryLedger::new()),
            events: null_sender(),
        }
    }

    pub fn with_registrar(mut self, registrar: Arc<dyn DarktableRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn RegistrationLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    /// Execute a plan.
    ///
    /// Only configuration problems are errors, and they are detected before
    /// anything is copied. Failed actions are recorded in the report and the
    /// remaining actions still run.
    pub fn execute(&self, plan: &ExportPlan) -> Result<ExecutionReport, ExportError> {
        self.preflight(plan)?;

        let started_at = Utc::now();
        let total = plan.len();
        info!("Executing export: {} actions", total);
        self.events
            .send(Event::Export(ExportEvent::Started { total_actions: total }));

        let mut report = ExecutionReport {
            id: Uuid::new_v4().to_string(),
            started_at,
            finished_at: started_at,
            actions: Vec::with_capacity(total),
            succeeded: 0,
            skipped: 0,
            failed: 0,
        };

        let mut completed = 0;
        let mut registrations = Vec::new();
        for planned in &plan.actions {
            match &planned.action {
                ExportAction::CopyTo {
                    source,
                    destination,
                    ..
                } => {
                    let outcome = self.copy(source, destination);
                    completed += 1;
                    self.finish(&mut report, planned, outcome, completed, total);
                }
                ExportAction::RegisterWithDarktable { paths } => {
                    registrations.push((planned, paths.as_slice()))
                }
            }
        }

        // Registrations run after every copy, as one darktable call.
        let requests: Vec<&[PathBuf]> = registrations.iter().map(|(_, paths)| *paths).collect();
        let outcomes = self.register_all(&requests);
        for ((planned, _), outcome) in registrations.into_iter().zip(outcomes) {
            completed += 1;
            self.finish(&mut report, planned, outcome, completed, total);
        }

        report.finished_at = Utc::now();
        info!(
            "Export finished: {} succeeded, {} skipped, {} failed",
            report.succeeded, report.skipped, report.failed
        );
        self.events.send(Event::Export(ExportEvent::Completed {
            succeeded: report.succeeded,
            skipped: report.skipped,
            failed: report.failed,
        }));

        Ok(report)
    }

    /// Execute on a background thread.
    pub fn spawn_execute(&self, plan: ExportPlan) -> JoinHandle<Result<ExecutionReport, ExportError>> {
        let executor = self.clone();
        std::thread::spawn(move || executor.execute(&plan))
    }

    fn finish(
        &self,
        report: &mut ExecutionReport,
        planned: &PlannedAction,
        outcome: ActionOutcome,
        completed: usize,
        total: usize,
    ) {
        match &outcome {
            ActionOutcome::Succeeded => report.succeeded += 1,
            ActionOutcome::SkippedAlreadyDone => report.skipped += 1,
            ActionOutcome::Failed { reason } => {
                warn!(
                    "{}: {} failed: {}",
                    planned.group_id,
                    planned.action.describe(),
                    reason
                );
                report.failed += 1;
            }
        }

        self.events
            .send(Event::Export(ExportEvent::ActionFinished {
                completed,
                total,
                group_id: planned.group_id.to_string(),
                outcome: outcome.to_string(),
            }));

        report.actions.push(ActionReport {
            group_id: planned.group_id.clone(),
            action: planned.action.clone(),
            outcome,
        });
    }

    fn preflight(&self, plan: &ExportPlan) -> Result<(), ExportError> {
        if plan.needs_darktable() && self.registrar.is_none() {
            return Err(ExportError::RegistrarMissing);
        }

        for target in &plan.targets {
            let not_writable = |e: io::Error| ExportError::TargetNotWritable {
                path: target.clone(),
                reason: e.to_string(),
            };
            fs::create_dir_all(target).map_err(not_writable)?;
            // Dropping the probe deletes it.
            NamedTempFile::new_in(target).map_err(not_writable)?;
            debug!("Backup target {} is writable", target.display());
        }
        Ok(())
    }

    fn copy(&self, source: &Path, destination: &Path) -> ActionOutcome {
        match self.copy_if_needed(source, destination) {
            Ok(true) => ActionOutcome::Succeeded,
            Ok(false) => ActionOutcome::SkippedAlreadyDone,
            Err(e) => ActionOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Returns `false` when the destination already holds the file.
    fn copy_if_needed(&self, source: &Path, destination: &Path) -> io::Result<bool> {
        let source_meta = fs::metadata(source)?;

        if let Ok(existing) = fs::metadata(destination) {
            if existing.is_file()
                && existing.len() == source_meta.len()
                && (!self.verify_checksum || same_checksum(source, destination)?)
            {
                debug!("{} already backed up", destination.display());
                return Ok(false);
            }
        }

        let parent = destination
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)?;

        // Copy into a sibling temp file; it is removed on drop unless persisted.
        let mut temp = NamedTempFile::new_in(&parent)?;
        let mut input = File::open(source)?;
        let written = io::copy(&mut input, temp.as_file_mut())?;
        temp.as_file().sync_all()?;

        if written != source_meta.len() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!(
                    "Copy verification failed: source {} bytes, copy {} bytes",
                    source_meta.len(),
                    written
                ),
            ));
        }

        if let Ok(modified) = source_meta.modified() {
            if let Err(e) = temp.as_file().set_modified(modified) {
                debug!("Could not keep mtime on {}: {}", destination.display(), e);
            }
        }

        temp.persist(destination).map_err(|e| e.error)?;
        debug!("Copied {} -> {}", source.display(), destination.display());
        Ok(true)
    }

    /// Register every group's files with a single darktable call.
    ///
    /// Groups whose files are all in the ledger are skipped. The others
    /// share the outcome of the one call, which only receives files the
    /// ledger does not know yet.
    fn register_all(&self, requests: &[&[PathBuf]]) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::with_capacity(requests.len());
        let mut pending = Vec::new();
        let mut seen = HashSet::new();

        for paths in requests {
            match self.ledger.unregistered(paths) {
                Ok(missing) if missing.is_empty() => {
                    outcomes.push(Some(ActionOutcome::SkippedAlreadyDone))
                }
                Ok(missing) => {
                    for path in missing {
                        if seen.insert(path.clone()) {
                            pending.push(path);
                        }
                    }
                    outcomes.push(None);
                }
                Err(e) => outcomes.push(Some(ActionOutcome::Failed {
                    reason: e.to_string(),
                })),
            }
        }

        if pending.is_empty() {
            return outcomes.into_iter().flatten().collect();
        }
        let shared = self.register_batch(&pending);
        outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or_else(|| shared.clone()))
            .collect()
    }

    fn register_batch(&self, paths: &[PathBuf]) -> ActionOutcome {
        let Some(registrar) = &self.registrar else {
            return ActionOutcome::Failed {
                reason: ExportError::RegistrarMissing.to_string(),
            };
        };

        info!("Registering {} file(s) with darktable", paths.len());
        if let Err(e) = registrar.register(paths) {
            return ActionOutcome::Failed {
                reason: format!("darktable: {}", e),
            };
        }

        // An unrecorded registration would be repeated by the next export.
        match self.ledger.record(paths) {
            Ok(()) => ActionOutcome::Succeeded,
            Err(e) => ActionOutcome::Failed {
                reason: format!("registered with darktable but the ledger write failed: {}", e),
            },
        }
    }
}

fn same_checksum(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(xxh3_64(&read_file_bytes(a)?) == xxh3_64(&read_file_bytes(b)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::group::GroupId;
    use crate::error::CacheError;
    use crate::events::EventChannel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingRegistrar {
        calls: AtomicUsize,
        received: Mutex<Vec<PathBuf>>,
    }

    impl DarktableRegistrar for CountingRegistrar {
        fn register(&self, paths: &[PathBuf]) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.received.lock().unwrap().extend_from_slice(paths);
            Ok(())
        }
    }

    /// Knows nothing and cannot write
    struct ReadOnlyLedger;

    impl RegistrationLedger for ReadOnlyLedger {
        fn is_registered(&self, _path: &Path) -> Result<bool, CacheError> {
            Ok(false)
        }

        fn record(&self, _paths: &[PathBuf]) -> Result<(), CacheError> {
            Err(CacheError::QueryFailed("attempt to write a readonly database".into()))
        }
    }

    fn register_action(group: &str, files: &[&str]) -> PlannedAction {
        PlannedAction {
            group_id: GroupId::from(group),
            action: ExportAction::RegisterWithDarktable {
                paths: files.iter().map(PathBuf::from).collect(),
            },
        }
    }

    fn copy_action(group: &str, source: PathBuf, target: &Path) -> PlannedAction {
        let destination = target.join(source.file_name().unwrap());
        PlannedAction {
            group_id: GroupId::from(group),
            action: ExportAction::CopyTo {
                target: target.to_path_buf(),
                source,
                destination,
            },
        }
    }

    fn plan(actions: Vec<PlannedAction>, targets: Vec<PathBuf>) -> ExportPlan {
        ExportPlan {
            group_count: actions.len(),
            actions,
            targets,
        }
    }

    #[test]
    fn copies_then_skips_on_second_run() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("IMG_001.JPG");
        fs::write(&file, b"jpeg data").unwrap();

        let plan = plan(
            vec![copy_action("IMG_001", file, dst.path())],
            vec![dst.path().to_path_buf()],
        );
        let executor = ExportExecutor::new(&ExportConfig::default());

        let first = executor.execute(&plan).unwrap();
        assert_eq!(first.succeeded, 1);
        assert_eq!(fs::read(dst.path().join("IMG_001.JPG")).unwrap(), b"jpeg data");

        let second = executor.execute(&plan).unwrap();
        assert_eq!(second.skipped, 1);
        assert!(second.is_noop());
    }

    #[test]
    fn checksum_mismatch_with_equal_size_recopies() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("IMG_001.JPG");
        fs::write(&file, b"aaaa").unwrap();
        fs::write(dst.path().join("IMG_001.JPG"), b"bbbb").unwrap();

        let plan = plan(
            vec![copy_action("IMG_001", file, dst.path())],
            vec![dst.path().to_path_buf()],
        );

        let size_only = ExportExecutor::new(&ExportConfig::default());
        assert_eq!(size_only.execute(&plan).unwrap().skipped, 1);

        let verifying = ExportExecutor::new(&ExportConfig {
            verify_checksum: true,
            ..ExportConfig::default()
        });
        assert_eq!(verifying.execute(&plan).unwrap().succeeded, 1);
        assert_eq!(fs::read(dst.path().join("IMG_001.JPG")).unwrap(), b"aaaa");
    }

    #[test]
    fn one_failure_does_not_stop_the_batch() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let good = src.path().join("IMG_002.JPG");
        fs::write(&good, b"ok").unwrap();

        let plan = plan(
            vec![
                copy_action("IMG_001", src.path().join("missing.JPG"), dst.path()),
                copy_action("IMG_002", good, dst.path()),
            ],
            vec![dst.path().to_path_buf()],
        );

        let report = ExportExecutor::new(&ExportConfig::default())
            .execute(&plan)
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        assert!(report.has_failures());
        assert_eq!(report.failures().next().unwrap().group_id.as_str(), "IMG_001");
        assert!(dst.path().join("IMG_002.JPG").exists());
        assert!(!dst.path().join("missing.JPG").exists());
    }

    #[test]
    fn unusable_target_aborts_before_any_action() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let good_target = dst.path().join("good");
        let blocked = dst.path().join("blocked");
        fs::write(&blocked, b"a file, not a directory").unwrap();
        let file = src.path().join("IMG_001.JPG");
        fs::write(&file, b"x").unwrap();

        let plan = plan(
            vec![copy_action("IMG_001", file, &good_target)],
            vec![good_target.clone(), blocked.join("sub")],
        );

        let err = ExportExecutor::new(&ExportConfig::default())
            .execute(&plan)
            .unwrap_err();

        assert!(matches!(err, ExportError::TargetNotWritable { .. }));
        assert!(!good_target.join("IMG_001.JPG").exists());
    }

    #[test]
    fn darktable_without_registrar_is_a_configuration_error() {
        let plan = plan(
            vec![PlannedAction {
                group_id: GroupId::from("IMG_001"),
                action: ExportAction::RegisterWithDarktable {
                    paths: vec![PathBuf::from("/shoot/IMG_001.JPG")],
                },
            }],
            vec![],
        );

        let err = ExportExecutor::new(&ExportConfig::default())
            .execute(&plan)
            .unwrap_err();
        assert!(matches!(err, ExportError::RegistrarMissing));
    }

    #[test]
    fn darktable_is_invoked_once_across_runs() {
        let registrar = Arc::new(CountingRegistrar::default());
        let plan = plan(
            vec![PlannedAction {
                group_id: GroupId::from("IMG_001"),
                action: ExportAction::RegisterWithDarktable {
                    paths: vec![PathBuf::from("/shoot/IMG_001.JPG")],
                },
            }],
            vec![],
        );
        let executor = ExportExecutor::new(&ExportConfig::default())
            .with_registrar(registrar.clone());

        assert_eq!(executor.execute(&plan).unwrap().succeeded, 1);
        assert_eq!(executor.execute(&plan).unwrap().skipped, 1);
        assert_eq!(registrar.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn one_darktable_call_covers_every_group() {
        let registrar = Arc::new(CountingRegistrar::default());
        let plan = plan(
            vec![
                register_action("IMG_001", &["/shoot/IMG_001.CR2", "/shoot/IMG_001.JPG"]),
                register_action("IMG_002", &["/shoot/IMG_002.JPG"]),
                register_action("IMG_003", &["/shoot/IMG_003.NEF"]),
            ],
            vec![],
        );
        let executor = ExportExecutor::new(&ExportConfig::default())
            .with_registrar(registrar.clone());

        let report = executor.execute(&plan).unwrap();

        assert_eq!(registrar.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registrar.received.lock().unwrap().len(), 4);
        assert_eq!(report.succeeded, 3);
        let groups: Vec<&str> = report.actions.iter().map(|a| a.group_id.as_str()).collect();
        assert_eq!(groups, vec!["IMG_001", "IMG_002", "IMG_003"]);
    }

    #[test]
    fn only_files_missing_from_the_ledger_are_sent() {
        let registrar = Arc::new(CountingRegistrar::default());
        let ledger = Arc::new(InMemoryLedger::new());
        ledger
            .record(&[
                PathBuf::from("/shoot/IMG_001.CR2"),
                PathBuf::from("/shoot/IMG_002.JPG"),
            ])
            .unwrap();
        let plan = plan(
            vec![
                register_action("IMG_001", &["/shoot/IMG_001.CR2", "/shoot/IMG_001.JPG"]),
                register_action("IMG_002", &["/shoot/IMG_002.JPG"]),
            ],
            vec![],
        );
        let executor = ExportExecutor::new(&ExportConfig::default())
            .with_registrar(registrar.clone())
            .with_ledger(ledger);

        let report = executor.execute(&plan).unwrap();

        assert_eq!(
            *registrar.received.lock().unwrap(),
            vec![PathBuf::from("/shoot/IMG_001.JPG")]
        );
        assert_eq!(report.actions[0].outcome, ActionOutcome::Succeeded);
        assert_eq!(report.actions[1].outcome, ActionOutcome::SkippedAlreadyDone);
    }

    #[test]
    fn ledger_write_failure_is_reported_as_failed() {
        let registrar = Arc::new(CountingRegistrar::default());
        let plan = plan(
            vec![
                register_action("IMG_001", &["/shoot/IMG_001.JPG"]),
                register_action("IMG_002", &["/shoot/IMG_002.JPG"]),
            ],
            vec![],
        );
        let executor = ExportExecutor::new(&ExportConfig::default())
            .with_registrar(registrar.clone())
            .with_ledger(Arc::new(ReadOnlyLedger));

        let report = executor.execute(&plan).unwrap();

        assert_eq!(registrar.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.succeeded, 0);
        for action in &report.actions {
            match &action.outcome {
                ActionOutcome::Failed { reason } => assert!(reason.contains("ledger write failed")),
                other => panic!("expected a failure, got {:?}", other),
            }
        }
    }

    #[test]
    fn spawn_execute_reports_progress() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let file = src.path().join("IMG_001.JPG");
        fs::write(&file, b"x").unwrap();
        let (sender, receiver) = EventChannel::new();

        let executor = ExportExecutor::new(&ExportConfig::default()).with_events(sender);
        let handle = executor.spawn_execute(plan(
            vec![copy_action("IMG_001", file, dst.path())],
            vec![dst.path().to_path_buf()],
        ));
        let report = handle.join().unwrap().unwrap();

        assert_eq!(report.succeeded, 1);
        let events: Vec<Event> = receiver.try_iter().collect();
        assert!(matches!(
            events.first(),
            Some(Event::Export(ExportEvent::Started { total_actions: 1 }))
        ));
        assert!(matches!(
            events.last(),
            Some(Event::Export(ExportEvent::Completed { succeeded: 1, .. }))
        ));
    }
}
