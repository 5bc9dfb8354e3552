//! Terminal and JSON rendering for CLI commands.

use console::{style, Term};
use photo_cull::core::blur::is_blurry;
use photo_cull::core::export::{ActionOutcome, ExecutionReport, ExportAction, ExportPlan};
use photo_cull::core::group::{Decision, GroupId, PhotoGroup};
use photo_cull::core::scanner::ScanWarning;
use photo_cull::core::session::CullingSession;
use serde::Serialize;
use std::path::Path;

pub fn print_header(term: &Term) {
    term.write_line(&format!(
        "{} {}",
        style("photo-cull").bold().cyan(),
        style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();
    term.write_line("").ok();
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn decision_label(decision: Decision) -> String {
    if decision.is_rejected() {
        style("rejected").red().to_string()
    } else if decision.rating().is_rated() {
        style(decision.rating().to_string()).yellow().to_string()
    } else {
        style("-").dim().to_string()
    }
}

fn file_kinds(group: &PhotoGroup) -> &'static str {
    if group.files().is_pair() {
        "RAW+JPEG"
    } else if group.raw_path().is_some() {
        "RAW"
    } else {
        "JPEG"
    }
}

fn display_path(path: &Path) -> String {
    let home = dirs::home_dir().unwrap_or_default();
    match path.strip_prefix(&home) {
        Ok(rest) if !home.as_os_str().is_empty() => format!("~/{}", rest.display()),
        _ => path.display().to_string(),
    }
}

pub fn print_groups(
    term: &Term,
    session: &CullingSession,
    warnings: &[ScanWarning],
    blur_threshold: f64,
    verbose: bool,
) {
    let stats = session.stats(blur_threshold);
    term.write_line(&format!(
        "{} {} photos in {}",
        style("✓").green().bold(),
        style(stats.total).cyan(),
        display_path(session.root())
    ))
    .ok();
    term.write_line(&format!(
        "  {} selected, {} rejected, {} undecided",
        style(stats.selected()).green(),
        style(stats.rejected).red(),
        stats.undecided
    ))
    .ok();
    term.write_line("").ok();

    let current = session.cursor();
    for (i, group) in session.groups().iter().enumerate() {
        let marker = if Some(i) == current {
            style("▶").cyan().to_string()
        } else {
            " ".to_string()
        };
        let summary = group
            .metadata()
            .map(|m| format!("{}  {}", m.camera_display(), m.exposure_display()))
            .unwrap_or_else(|| "metadata pending".to_string());

        term.write_line(&format!(
            "{} {:<28} {:<9} {:<10} {}",
            marker,
            group.id().as_str(),
            file_kinds(group),
            decision_label(group.decision()),
            style(summary).dim()
        ))
        .ok();

        if verbose {
            if let Some(dimensions) = group.metadata().and_then(|m| m.dimensions_display()) {
                term.write_line(&format!("      {}", style(dimensions).dim())).ok();
            }
            for path in group.files().paths() {
                term.write_line(&format!("      {}", style(display_path(path)).dim()))
                    .ok();
            }
        }
    }

    if !warnings.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!(
            "{} {} files skipped",
            style("!").yellow().bold(),
            warnings.len()
        ))
        .ok();
        for warning in warnings {
            term.write_line(&format!("  {}", style(warning).dim())).ok();
        }
    }
}

pub fn print_decision(term: &Term, group: &str, decision: Decision, next: Option<&GroupId>) {
    term.write_line(&format!(
        "{} {} {}",
        style("✓").green().bold(),
        group,
        decision_label(decision)
    ))
    .ok();
    if let Some(next) = next {
        term.write_line(&format!("  {} {}", style("next:").dim(), next))
            .ok();
    }
}

pub fn print_blur(term: &Term, session: &CullingSession, threshold: f64) {
    let stats = session.stats(threshold);
    term.write_line(&format!(
        "{} Scored {} photos, {} below {:.0}",
        style("✓").green().bold(),
        stats.total - stats.blur_pending,
        style(stats.blurry).yellow(),
        threshold
    ))
    .ok();
    term.write_line("").ok();

    for group in session.groups() {
        let line = match group.blur_score() {
            Some(score) if is_blurry(score, threshold) => format!(
                "  {:<28} {:>10.1}  {}",
                group.id().as_str(),
                score,
                style("BLURRY").yellow().bold()
            ),
            Some(score) => format!("  {:<28} {:>10.1}", group.id().as_str(), score),
            None => format!("  {:<28} {:>10}", group.id().as_str(), "unavailable"),
        };
        term.write_line(&line).ok();
    }
}

pub fn print_plan(term: &Term, plan: &ExportPlan) {
    term.write_line(&format!(
        "{} {} copies to {} targets for {} photos (dry run)",
        style("Plan:").bold(),
        plan.copy_count(),
        plan.targets.len(),
        plan.group_count
    ))
    .ok();
    for planned in &plan.actions {
        let line = match &planned.action {
            ExportAction::CopyTo {
                source,
                destination,
                ..
            } => format!(
                "  copy {} -> {}",
                display_path(source),
                display_path(destination)
            ),
            ExportAction::RegisterWithDarktable { .. } => {
                format!("  {} {}", planned.group_id, planned.action.describe())
            }
        };
        term.write_line(&line).ok();
    }
}

pub fn print_report(term: &Term, report: &ExecutionReport, verbose: bool) {
    if report.is_noop() {
        term.write_line(&format!(
            "{} Everything was already exported",
            style("✓").green().bold()
        ))
        .ok();
        return;
    }

    let mark = if report.has_failures() {
        style("!").yellow().bold()
    } else {
        style("✓").green().bold()
    };
    term.write_line(&format!(
        "{} Export complete in {:.1}s",
        mark,
        report.duration_ms() as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} done, {} already done, {} failed",
        style(report.succeeded).green(),
        style(report.skipped).dim(),
        style(report.failed).red()
    ))
    .ok();

    for action in &report.actions {
        let show = verbose || matches!(action.outcome, ActionOutcome::Failed { .. });
        if show {
            term.write_line(&format!(
                "  {} {}: {}",
                action.group_id,
                action.action.describe(),
                action.outcome
            ))
            .ok();
        }
    }

    if report.has_failures() {
        term.write_line("").ok();
        term.write_line(&format!(
            "{}",
            style("Run the export again to retry failed actions; finished ones are skipped.").dim()
        ))
        .ok();
    }
}

#[derive(Serialize)]
struct GroupJson<'a> {
    id: &'a str,
    raw: Option<&'a Path>,
    jpeg: Option<&'a Path>,
    rating: u8,
    rejected: bool,
    blur_score: Option<f64>,
    blurry: Option<bool>,
    camera: Option<String>,
    exposure: Option<String>,
}

#[derive(Serialize)]
pub struct SessionJson<'a> {
    root: &'a Path,
    cursor: Option<usize>,
    groups: Vec<GroupJson<'a>>,
    warnings: Vec<String>,
}

pub fn session_json<'a>(
    session: &'a CullingSession,
    warnings: &[ScanWarning],
    blur_threshold: f64,
) -> SessionJson<'a> {
    SessionJson {
        root: session.root(),
        cursor: session.cursor(),
        groups: session
            .groups()
            .iter()
            .map(|g| GroupJson {
                id: g.id().as_str(),
                raw: g.raw_path(),
                jpeg: g.jpeg_path(),
                rating: g.decision().rating().stars(),
                rejected: g.decision().is_rejected(),
                blur_score: g.blur_score(),
                blurry: g.blur_score().map(|s| is_blurry(s, blur_threshold)),
                camera: g.metadata().map(|m| m.camera_display()),
                exposure: g.metadata().map(|m| m.exposure_display()),
            })
            .collect(),
        warnings: warnings.iter().map(ToString::to_string).collect(),
    }
}
