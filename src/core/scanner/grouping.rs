//! Pairing classified files into groups.

use super::filter::{ExtensionFilter, FileKind};
use super::ScanWarning;
use crate::core::group::GroupFiles;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A RAW or JPEG file found by the walker
#[derive(Debug, Clone)]
pub(super) struct Candidate {
    pub path: PathBuf,
    pub relative_dir: PathBuf,
    pub basename: String,
    pub kind: FileKind,
}

#[derive(Default)]
struct Slot {
    raws: Vec<PathBuf>,
    jpegs: Vec<PathBuf>,
}

/// Group candidates by `(relative_dir, basename)` and pick one file per kind.
///
/// Output is sorted by basename, then relative directory.
pub(super) fn group_candidates(
    candidates: Vec<Candidate>,
    filter: &ExtensionFilter,
) -> (Vec<GroupFiles>, Vec<ScanWarning>) {
    let mut slots: BTreeMap<(String, PathBuf), Slot> = BTreeMap::new();

    for candidate in candidates {
        let slot = slots
            .entry((candidate.basename, candidate.relative_dir))
            .or_default();
        match candidate.kind {
            FileKind::Raw => slot.raws.push(candidate.path),
            FileKind::Jpeg => slot.jpegs.push(candidate.path),
            FileKind::Other => {}
        }
    }

    let mut groups = Vec::with_capacity(slots.len());
    let mut warnings = Vec::new();

    for ((basename, relative_dir), slot) in slots {
        let raw = pick(slot.raws, filter, &mut warnings);
        let jpeg = pick(slot.jpegs, filter, &mut warnings);
        if let Some(files) = GroupFiles::new(relative_dir, basename, raw, jpeg) {
            groups.push(files);
        }
    }

    (groups, warnings)
}

/// Keep the candidate with the highest-priority extension; report the rest.
fn pick(
    mut paths: Vec<PathBuf>,
    filter: &ExtensionFilter,
    warnings: &mut Vec<ScanWarning>,
) -> Option<PathBuf> {
    paths.sort_by(|a, b| match filter.priority(a).cmp(&filter.priority(b)) {
        Ordering::Equal => a.cmp(b),
        other => other,
    });

    let mut iter = paths.into_iter();
    let kept = iter.next()?;
    for path in iter {
        warnings.push(ScanWarning::DuplicateCandidate {
            path,
            kept: kept.clone(),
        });
    }
    Some(kept)
}
