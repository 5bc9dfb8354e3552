//! # CLI Module
//!
//! Command-line interface for the photo culling engine.
//!
//! ## Usage
//! ```bash
//! # List the groups in a shoot with their decisions
//! photo-cull scan ~/Shoots/2024-06-01
//!
//! # Rate, reject or clear one photo (decisions persist between runs)
//! photo-cull rate ~/Shoots/2024-06-01 IMG_0042 3
//! photo-cull reject ~/Shoots/2024-06-01 day2/IMG_0107
//!
//! # Score sharpness and flag blurry shots
//! photo-cull blur ~/Shoots/2024-06-01 --threshold 150
//!
//! # Back up selected photos and hand them to darktable
//! photo-cull export ~/Shoots/2024-06-01 --target /mnt/nas/photos
//! ```

mod output;

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_cull::config::{expand_home, CullConfig};
use photo_cull::core::blur::{BlurScorer, LaplacianVariance};
use photo_cull::core::cache::{CacheBackend, InMemoryCache, SqliteCache};
use photo_cull::core::enrich::{EnrichRequest, EnrichmentPool};
use photo_cull::core::export::{
    CommandRegistrar, ExportExecutor, ExportPlanner, RegistrationLedger, SqliteLedger,
};
use photo_cull::core::group::GroupId;
use photo_cull::core::metadata::MetadataExtractor;
use photo_cull::core::preview::DefaultPreviewDecoder;
use photo_cull::core::scanner::{PhotoScanner, ScanWarning, WalkDirScanner};
use photo_cull::core::session::{CullingSession, SessionStore};
use photo_cull::error::{CullError, ExportError, Result};
use photo_cull::events::{EnrichEvent, Event, EventChannel, ExportEvent, ScanEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// photo-cull - Rate, reject and back up a shoot from the keyboard
#[derive(Parser, Debug)]
#[command(name = "photo-cull")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/photo-cull/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session file (default: <DIR>/.photo-cull/session.json)
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List photo groups with their decisions and metadata
    Scan {
        /// Shoot directory
        dir: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Rate a photo 0-3 stars (0 clears the rating)
    Rate {
        dir: PathBuf,
        /// Group id as shown by `scan`, e.g. `IMG_001` or `day1/IMG_001`
        group: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=3))]
        stars: u8,
    },

    /// Reject a photo
    Reject { dir: PathBuf, group: String },

    /// Clear a photo's rating and rejection
    Clear { dir: PathBuf, group: String },

    /// Score sharpness and flag blurry photos
    Blur {
        dir: PathBuf,

        /// Scores below this are blurry (default from config)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Back up selected photos and register them with darktable
    Export {
        dir: PathBuf,

        /// Backup target (repeatable; replaces configured targets)
        #[arg(long = "target")]
        targets: Vec<PathBuf>,

        /// Skip darktable registration
        #[arg(long)]
        no_darktable: bool,

        /// Show the plan without executing it
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Which decision a command applies
#[derive(Debug, Clone, Copy)]
enum DecisionCommand {
    Rate(u8),
    Reject,
    Clear,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    photo_cull::init_tracing(if cli.verbose {
        "photo_cull=debug"
    } else {
        "photo_cull=warn"
    });

    let config = CullConfig::load(cli.config.as_deref())?;
    let ctx = Context {
        config,
        session_path: cli.session,
        verbose: cli.verbose,
        term: Term::stderr(),
    };

    match cli.command {
        Commands::Scan { dir, output } => run_scan(&ctx, &dir, output),
        Commands::Rate { dir, group, stars } => {
            run_decision(&ctx, &dir, &group, DecisionCommand::Rate(stars))
        }
        Commands::Reject { dir, group } => run_decision(&ctx, &dir, &group, DecisionCommand::Reject),
        Commands::Clear { dir, group } => run_decision(&ctx, &dir, &group, DecisionCommand::Clear),
        Commands::Blur {
            dir,
            threshold,
            output,
        } => run_blur(&ctx, &dir, threshold, output),
        Commands::Export {
            dir,
            targets,
            no_darktable,
            dry_run,
            output,
        } => run_export(&ctx, &dir, targets, no_darktable, dry_run, output),
    }
}

struct Context {
    config: CullConfig,
    session_path: Option<PathBuf>,
    verbose: bool,
    term: Term,
}

impl Context {
    fn store(&self, root: &Path) -> SessionStore {
        match &self.session_path {
            Some(path) => SessionStore::new(path),
            None => SessionStore::for_root(root),
        }
    }

    /// Scan the shoot and restore saved decisions.
    fn open_session(&self, root: &Path, show_progress: bool) -> Result<OpenSession> {
        let scanner = WalkDirScanner::new(self.config.scan.clone());
        let (sender, receiver) = EventChannel::new();

        let spinner = show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        });
        let spinner_clone = spinner.clone();
        let event_thread = thread::spawn(move || {
            for event in receiver.iter() {
                if let (Some(pb), Event::Scan(ScanEvent::Progress(p))) = (&spinner_clone, &event) {
                    pb.set_message(format!("Scanning... {} files", p.files_found));
                    pb.tick();
                }
            }
        });

        let scan = scanner.scan_with_events(root, &sender);
        drop(sender);
        event_thread.join().ok();
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        let scan = scan?;

        let warnings = scan.warnings.clone();
        let mut session = CullingSession::from_scan(scan)
            .with_circular(self.config.navigation.circular);

        let store = self.store(root);
        if let Some(snapshot) = store.load()? {
            session.restore(&snapshot);
        }

        Ok(OpenSession {
            session,
            store,
            warnings,
        })
    }

    fn scorer(&self) -> Result<BlurScorer> {
        let cache: Arc<dyn CacheBackend> = match &self.config.blur.cache_path {
            Some(path) => Arc::new(SqliteCache::open_with_prune(path)?),
            None => Arc::new(InMemoryCache::new()),
        };
        Ok(BlurScorer::new(
            Box::new(LaplacianVariance::new(self.config.blur.analysis_size)),
            cache,
        ))
    }

    /// Run enrichment for every group that needs it, with a progress bar.
    fn enrich(&self, session: &mut CullingSession, request: EnrichRequest, pretty: bool) -> Result<()> {
        let (sender, receiver) = EventChannel::new();
        let pool = EnrichmentPool::builder()
            .workers(self.config.worker_count())
            .extractor(Arc::new(MetadataExtractor::new()))
            .scorer(Arc::new(self.scorer()?))
            .decoder(Arc::new(DefaultPreviewDecoder))
            .events(sender)
            .build()?;

        let mut queued = 0;
        for group in session.groups() {
            let wanted = EnrichRequest {
                metadata: request.metadata && group.needs_metadata(),
                blur: request.blur && group.needs_blur(),
            };
            if !wanted.is_empty() {
                pool.submit_with(group.files().clone(), wanted);
                queued += 1;
            }
        }
        debug!("Queued {} groups for enrichment", queued);

        let progress = (pretty && queued > 0).then(|| {
            let pb = ProgressBar::new(queued as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            pb
        });
        let progress_clone = progress.clone();
        // A task's last step marks it done
        let step: fn(&EnrichEvent) -> bool = if request.blur {
            |e| {
                matches!(
                    e,
                    EnrichEvent::BlurScored { .. }
                        | EnrichEvent::CacheHit { .. }
                        | EnrichEvent::Error { .. }
                        | EnrichEvent::Cancelled { .. }
                )
            }
        } else {
            |e| {
                matches!(
                    e,
                    EnrichEvent::MetadataReady { .. }
                        | EnrichEvent::Error { .. }
                        | EnrichEvent::Cancelled { .. }
                )
            }
        };
        let event_thread = thread::spawn(move || {
            for event in receiver.iter() {
                if let (Some(pb), Event::Enrich(e)) = (&progress_clone, &event) {
                    if step(e) {
                        pb.inc(1);
                    }
                }
            }
        });

        let results = pool.wait_idle();
        drop(pool);
        event_thread.join().ok();
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let applied = results
            .into_iter()
            .filter(|r| session.apply(r.clone()))
            .count();
        info!("Applied {} enrichment results", applied);
        Ok(())
    }
}

struct OpenSession {
    session: CullingSession,
    store: SessionStore,
    warnings: Vec<ScanWarning>,
}

fn run_scan(ctx: &Context, dir: &Path, output: OutputFormat) -> Result<()> {
    let pretty = output == OutputFormat::Pretty;
    if pretty {
        output::print_header(&ctx.term);
    }

    let OpenSession {
        mut session,
        warnings,
        ..
    } = ctx.open_session(dir, pretty)?;
    ctx.enrich(
        &mut session,
        EnrichRequest {
            metadata: true,
            blur: false,
        },
        pretty,
    )?;

    match output {
        OutputFormat::Pretty => {
            output::print_groups(&ctx.term, &session, &warnings, ctx.config.culling.blur_threshold, ctx.verbose)
        }
        OutputFormat::Json => output::print_json(&output::session_json(
            &session,
            &warnings,
            ctx.config.culling.blur_threshold,
        )),
    }
    Ok(())
}

fn run_decision(ctx: &Context, dir: &Path, group: &str, command: DecisionCommand) -> Result<()> {
    let OpenSession {
        mut session, store, ..
    } = ctx.open_session(dir, false)?;

    session.jump_to_group(&GroupId::from(group))?;
    match command {
        DecisionCommand::Rate(stars) => session.rate(stars)?,
        DecisionCommand::Reject => session.reject()?,
        DecisionCommand::Clear => session.clear_decision()?,
    }

    let decision = session.current()?.decision();
    if ctx.config.culling.auto_advance && !matches!(command, DecisionCommand::Clear) {
        session.advance();
    }
    store.save(&session.snapshot())?;

    let next = session
        .current()
        .ok()
        .map(|g| g.id().clone())
        .filter(|id| id.as_str() != group);
    output::print_decision(&ctx.term, group, decision, next.as_ref());
    Ok(())
}

fn run_blur(ctx: &Context, dir: &Path, threshold: Option<f64>, output: OutputFormat) -> Result<()> {
    let pretty = output == OutputFormat::Pretty;
    let threshold = threshold.unwrap_or(ctx.config.culling.blur_threshold);
    if pretty {
        output::print_header(&ctx.term);
    }

    let OpenSession {
        mut session,
        warnings,
        ..
    } = ctx.open_session(dir, pretty)?;
    ctx.enrich(&mut session, EnrichRequest::ALL, pretty)?;

    match output {
        OutputFormat::Pretty => output::print_blur(&ctx.term, &session, threshold),
        OutputFormat::Json => output::print_json(&output::session_json(&session, &warnings, threshold)),
    }
    Ok(())
}

fn run_export(
    ctx: &Context,
    dir: &Path,
    targets: Vec<PathBuf>,
    no_darktable: bool,
    dry_run: bool,
    output: OutputFormat,
) -> Result<()> {
    let pretty = output == OutputFormat::Pretty;
    if pretty {
        output::print_header(&ctx.term);
    }

    let OpenSession { session, .. } = ctx.open_session(dir, pretty)?;

    let mut export_config = ctx.config.export_config();
    if !targets.is_empty() {
        export_config.backup_targets = targets
            .iter()
            .map(|p| expand_home(p))
            .collect();
    }
    if no_darktable {
        export_config.darktable_enabled = false;
    }

    let plan = ExportPlanner::plan(&session, &export_config);
    if plan.is_empty() {
        if pretty {
            ctx.term
                .write_line(&format!(
                    "  {} Nothing to export: no photos are rated.",
                    style("i").cyan()
                ))
                .ok();
        } else {
            output::print_json(&plan);
        }
        return Ok(());
    }

    if dry_run {
        match output {
            OutputFormat::Pretty => output::print_plan(&ctx.term, &plan),
            OutputFormat::Json => output::print_json(&plan),
        }
        return Ok(());
    }

    let mut executor = ExportExecutor::new(&export_config);
    if export_config.darktable_enabled {
        let ledger: Arc<dyn RegistrationLedger> = Arc::new(
            SqliteLedger::open(&ctx.config.ledger_path()).map_err(ExportError::from)?,
        );
        let registrar = CommandRegistrar::new(&ctx.config.darktable.executable);
        if !registrar.is_available() {
            warn!(
                "{} does not run; darktable registration will fail",
                registrar.executable().display()
            );
            if pretty {
                ctx.term
                    .write_line(&format!(
                        "  {} {} not found; copies still run, registration will be reported as failed",
                        style("!").yellow().bold(),
                        registrar.executable().display()
                    ))
                    .ok();
            }
        }
        executor = executor
            .with_registrar(Arc::new(registrar))
            .with_ledger(ledger);
    }

    let (sender, receiver) = EventChannel::new();
    let progress = pretty.then(|| {
        let pb = ProgressBar::new(plan.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        pb
    });

    let handle = executor.with_events(sender).spawn_execute(plan);
    for event in receiver.iter() {
        if let (Some(pb), Event::Export(ExportEvent::ActionFinished { completed, group_id, .. })) =
            (&progress, &event)
        {
            pb.set_position(*completed as u64);
            pb.set_message(group_id.clone());
        }
    }
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = handle
        .join()
        .map_err(|_| CullError::WorkerPool("export thread panicked".to_string()))??;

    match output {
        OutputFormat::Pretty => output::print_report(&ctx.term, &report, ctx.verbose),
        OutputFormat::Json => output::print_json(&report),
    }
    Ok(())
}
