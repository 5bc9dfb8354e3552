//! # Session Module
//!
//! The culling state machine: an ordered list of photo groups, a cursor,
//! and one decision per group.
//!
//! All operations take `&mut self` and complete synchronously. Background
//! enrichment results are merged with [`CullingSession::apply`]; decisions
//! survive restarts through [`SessionSnapshot`] and [`SessionStore`].

mod snapshot;

pub use snapshot::{SessionSnapshot, SessionStore, SNAPSHOT_VERSION};

use crate::core::blur::is_blurry;
use crate::core::enrich::{Enrichment, EnrichmentKind};
use crate::core::group::{Decision, GroupFiles, GroupId, PhotoGroup, Rating};
use crate::core::scanner::ScanResult;
use crate::error::SessionError;
use crate::events::{Event, EventSender, SessionEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Whether the session has anything to cull
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    Active,
    Empty,
}

/// Decision counts across the session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total: usize,
    /// Groups rated 1, 2 and 3 stars (not rejected)
    pub rated: [usize; 3],
    pub rejected: usize,
    pub undecided: usize,
    /// Scored groups below the blur threshold
    pub blurry: usize,
    /// Groups without a blur score yet
    pub blur_pending: usize,
}

impl SessionStats {
    /// Groups that will be exported
    pub fn selected(&self) -> usize {
        self.rated.iter().sum()
    }
}

/// Outcome of restoring a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Snapshot entries that matched a group
    pub applied: usize,
    /// Snapshot entries for groups no longer present
    pub dropped: usize,
}

/// An ordered culling session over one scanned directory
#[derive(Debug, Clone)]
pub struct CullingSession {
    root: PathBuf,
    groups: Vec<PhotoGroup>,
    index: HashMap<GroupId, usize>,
    cursor: usize,
    circular: bool,
    events: Option<EventSender>,
}

impl CullingSession {
    /// Create a session over already-grouped files, in the given order.
    pub fn new(root: impl Into<PathBuf>, files: Vec<GroupFiles>) -> Self {
        let groups: Vec<PhotoGroup> = files.into_iter().map(PhotoGroup::new).collect();
        let mut session = Self {
            root: root.into(),
            groups,
            index: HashMap::new(),
            cursor: 0,
            circular: false,
            events: None,
        };
        session.reindex();
        session
    }

    pub fn from_scan(scan: ScanResult) -> Self {
        Self::new(scan.root, scan.groups)
    }

    /// Wrap around at the ends instead of clamping
    pub fn with_circular(mut self, circular: bool) -> Self {
        self.circular = circular;
        self
    }

    /// Emit [`SessionEvent`]s on this sender
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> SessionMode {
        if self.groups.is_empty() {
            SessionMode::Empty
        } else {
            SessionMode::Active
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[PhotoGroup] {
        &self.groups
    }

    pub fn group(&self, id: &GroupId) -> Option<&PhotoGroup> {
        self.index.get(id).map(|&i| &self.groups[i])
    }

    /// Cursor position; `None` when the session is empty
    pub fn cursor(&self) -> Option<usize> {
        if self.groups.is_empty() {
            None
        } else {
            Some(self.cursor)
        }
    }

    pub fn current(&self) -> Result<&PhotoGroup, SessionError> {
        self.groups.get(self.cursor).ok_or(SessionError::EmptySession)
    }

    // ---- navigation ----

    /// Move forward one group; returns the new cursor.
    pub fn advance(&mut self) -> usize {
        if self.groups.is_empty() {
            return 0;
        }
        let last = self.groups.len() - 1;
        let next = if self.cursor < last {
            self.cursor + 1
        } else if self.circular {
            0
        } else {
            last
        };
        self.move_to(next);
        self.cursor
    }

    /// Move back one group; returns the new cursor.
    pub fn retreat(&mut self) -> usize {
        if self.groups.is_empty() {
            return 0;
        }
        let previous = if self.cursor > 0 {
            self.cursor - 1
        } else if self.circular {
            self.groups.len() - 1
        } else {
            0
        };
        self.move_to(previous);
        self.cursor
    }

    pub fn jump(&mut self, index: usize) -> Result<(), SessionError> {
        if self.groups.is_empty() {
            return Err(SessionError::EmptySession);
        }
        if index >= self.groups.len() {
            return Err(SessionError::OutOfRange {
                index,
                len: self.groups.len(),
            });
        }
        self.move_to(index);
        Ok(())
    }

    pub fn jump_to_group(&mut self, id: &GroupId) -> Result<(), SessionError> {
        let index = self.index_of(id)?;
        self.move_to(index);
        Ok(())
    }

    /// Move to the next undecided group after the cursor.
    ///
    /// Wraps around in circular mode. Returns whether the cursor moved.
    pub fn next_undecided(&mut self) -> bool {
        let len = self.groups.len();
        if len == 0 {
            return false;
        }

        let ahead = (self.cursor + 1..len).find(|&i| self.groups[i].decision().is_undecided());
        let found = match ahead {
            Some(i) => Some(i),
            None if self.circular => {
                (0..self.cursor).find(|&i| self.groups[i].decision().is_undecided())
            }
            None => None,
        };

        match found {
            Some(i) => {
                self.move_to(i);
                true
            }
            None => false,
        }
    }

    // ---- decisions ----

    /// Rate the current group 0-3 stars.
    ///
    /// A positive rating clears rejection; 0 clears the rating only.
    pub fn rate(&mut self, stars: u8) -> Result<(), SessionError> {
        let rating = Rating::new(stars)?;
        self.update_current(|d| d.with_rating(rating))
    }

    pub fn reject(&mut self) -> Result<(), SessionError> {
        self.update_current(|d| d.with_rejected(true))
    }

    pub fn toggle_reject(&mut self) -> Result<(), SessionError> {
        self.update_current(|d| d.with_rejected(!d.is_rejected()))
    }

    pub fn clear_decision(&mut self) -> Result<(), SessionError> {
        self.update_current(|_| Decision::default())
    }

    /// Set the decision for a group by id, without moving the cursor.
    pub fn decide(&mut self, id: &GroupId, decision: Decision) -> Result<(), SessionError> {
        let index = self.index_of(id)?;
        self.set_decision_at(index, decision);
        Ok(())
    }

    /// Groups rated at least one star and not rejected, in session order
    pub fn selected(&self) -> impl Iterator<Item = &PhotoGroup> {
        self.groups.iter().filter(|g| g.decision().is_selected())
    }

    pub fn rejected(&self) -> impl Iterator<Item = &PhotoGroup> {
        self.groups.iter().filter(|g| g.decision().is_rejected())
    }

    /// Scored groups below the threshold
    pub fn blurry(&self, threshold: f64) -> impl Iterator<Item = &PhotoGroup> {
        self.groups
            .iter()
            .filter(move |g| g.blur_score().map_or(false, |s| is_blurry(s, threshold)))
    }

    pub fn stats(&self, blur_threshold: f64) -> SessionStats {
        let mut stats = SessionStats {
            total: self.groups.len(),
            ..SessionStats::default()
        };

        for group in &self.groups {
            let decision = group.decision();
            if decision.is_rejected() {
                stats.rejected += 1;
            } else if decision.rating().is_rated() {
                stats.rated[usize::from(decision.rating().stars()) - 1] += 1;
            } else {
                stats.undecided += 1;
            }

            match group.blur_score() {
                Some(score) if is_blurry(score, blur_threshold) => stats.blurry += 1,
                Some(_) => {}
                None => stats.blur_pending += 1,
            }
        }

        stats
    }

    // ---- persistence ----

    pub fn snapshot(&self) -> SessionSnapshot {
        let decisions = self
            .groups
            .iter()
            .filter(|g| g.decision() != Decision::default())
            .map(|g| (g.id().clone(), g.decision()))
            .collect();

        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            cursor_group: self.groups.get(self.cursor).map(|g| g.id().clone()),
            decisions,
        }
    }

    /// Apply a snapshot by group id.
    ///
    /// Groups missing from the snapshot reset to undecided; entries for
    /// groups that no longer exist are dropped.
    pub fn restore(&mut self, snapshot: &SessionSnapshot) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        for group in &mut self.groups {
            group.set_decision(Decision::default());
        }
        for (id, decision) in &snapshot.decisions {
            match self.index.get(id) {
                Some(&i) => {
                    self.groups[i].set_decision(*decision);
                    summary.applied += 1;
                }
                None => {
                    debug!("Dropping stale decision for {}", id);
                    summary.dropped += 1;
                }
            }
        }

        if let Some(&i) = snapshot
            .cursor_group
            .as_ref()
            .and_then(|id| self.index.get(id))
        {
            self.cursor = i;
        }

        info!(
            "Restored {} decisions ({} stale dropped)",
            summary.applied, summary.dropped
        );
        self.emit(SessionEvent::Restored {
            applied: summary.applied,
            dropped: summary.dropped,
        });
        summary
    }

    /// Replace the groups with a fresh scan of the same root.
    ///
    /// Decisions, enrichment and the cursor carry over by group id. A group
    /// whose files changed keeps its decision but is enriched again.
    pub fn rescan(&mut self, scan: ScanResult) {
        let current = self.groups.get(self.cursor).map(|g| g.id().clone());
        let previous_cursor = self.cursor;
        let mut old: HashMap<GroupId, PhotoGroup> = self
            .groups
            .drain(..)
            .map(|g| (g.id().clone(), g))
            .collect();

        self.root = scan.root;
        self.groups = scan
            .groups
            .into_iter()
            .map(|files| match old.remove(files.id()) {
                Some(existing) if existing.files() == &files => existing,
                Some(existing) => {
                    let mut group = PhotoGroup::new(files);
                    group.set_decision(existing.decision());
                    group
                }
                None => PhotoGroup::new(files),
            })
            .collect();
        self.reindex();

        self.cursor = current
            .and_then(|id| self.index.get(&id).copied())
            .unwrap_or_else(|| previous_cursor.min(self.groups.len().saturating_sub(1)));

        info!(
            "Rescanned {}: {} groups, {} gone",
            self.root.display(),
            self.groups.len(),
            old.len()
        );
    }

    /// Merge a background enrichment result into its group.
    ///
    /// Returns `false` for unknown groups and for results that carry no data.
    pub fn apply(&mut self, enrichment: Enrichment) -> bool {
        let Some(&i) = self.index.get(&enrichment.group_id) else {
            debug!("Ignoring enrichment for unknown group {}", enrichment.group_id);
            return false;
        };

        let group = &mut self.groups[i];
        match enrichment.kind {
            EnrichmentKind::Metadata {
                result,
                source,
                stamp,
            } => {
                for failure in &result.failures {
                    debug!("{}: {} failed: {}", group.id(), failure.strategy, failure.reason);
                }
                group.merge_metadata(result.metadata, source, stamp);
            }
            EnrichmentKind::Blur(cached) => group.set_blur(cached),
            EnrichmentKind::Failed { .. } | EnrichmentKind::Cancelled => return false,
        }

        self.emit(SessionEvent::Enriched {
            group_id: enrichment.group_id.to_string(),
        });
        true
    }

    // ---- internals ----

    fn reindex(&mut self) {
        self.index = self
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.id().clone(), i))
            .collect();
    }

    fn index_of(&self, id: &GroupId) -> Result<usize, SessionError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| SessionError::UnknownGroup(id.to_string()))
    }

    fn move_to(&mut self, index: usize) {
        if index == self.cursor {
            return;
        }
        self.cursor = index;
        let group_id = self.groups[index].id().to_string();
        self.emit(SessionEvent::CursorMoved { index, group_id });
    }

    fn update_current(&mut self, f: impl FnOnce(Decision) -> Decision) -> Result<(), SessionError> {
        let decision = f(self.current()?.decision());
        self.set_decision_at(self.cursor, decision);
        Ok(())
    }

    fn set_decision_at(&mut self, index: usize, decision: Decision) {
        let group = &mut self.groups[index];
        group.set_decision(decision);
        debug!("{} -> {:?}", group.id(), decision);

        let event = SessionEvent::DecisionChanged {
            group_id: group.id().to_string(),
            rating: decision.rating().stars(),
            rejected: decision.is_rejected(),
        };
        self.emit(event);
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            events.send(Event::Session(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::{Cached, FileStamp};
    use crate::core::metadata::{ExtractionResult, MetadataField, MetadataValue, PhotoMetadata, StrategyKind};
    use crate::events::EventChannel;
    use std::time::SystemTime;

    fn files(name: &str) -> GroupFiles {
        GroupFiles::new(
            PathBuf::new(),
            name.to_string(),
            None,
            Some(PathBuf::from(format!("/shoot/{}.jpg", name))),
        )
        .unwrap()
    }

    fn session(names: &[&str]) -> CullingSession {
        CullingSession::new("/shoot", names.iter().map(|n| files(n)).collect())
    }

    fn id(name: &str) -> GroupId {
        GroupId::from(name)
    }

    #[test]
    fn retreat_at_start_stays_put() {
        let mut s = session(&["A", "B", "C"]);
        assert_eq!(s.retreat(), 0);
        assert_eq!(s.cursor(), Some(0));
    }

    #[test]
    fn advance_clamps_at_end() {
        let mut s = session(&["A", "B"]);
        assert_eq!(s.advance(), 1);
        assert_eq!(s.advance(), 1);
    }

    #[test]
    fn circular_navigation_wraps() {
        let mut s = session(&["A", "B", "C"]).with_circular(true);
        assert_eq!(s.retreat(), 2);
        assert_eq!(s.advance(), 0);
    }

    #[test]
    fn empty_session_navigation_is_a_no_op() {
        let mut s = session(&[]);
        assert_eq!(s.mode(), SessionMode::Empty);
        assert_eq!(s.advance(), 0);
        assert_eq!(s.retreat(), 0);
        assert_eq!(s.cursor(), None);
        assert_eq!(s.current().unwrap_err(), SessionError::EmptySession);
        assert_eq!(s.rate(1), Err(SessionError::EmptySession));
        assert!(!s.next_undecided());
    }

    #[test]
    fn jump_out_of_range_leaves_cursor() {
        let mut s = session(&["A", "B", "C"]);
        s.jump(1).unwrap();

        assert_eq!(s.jump(3), Err(SessionError::OutOfRange { index: 3, len: 3 }));
        assert_eq!(s.cursor(), Some(1));
    }

    #[test]
    fn jump_to_unknown_group_fails() {
        let mut s = session(&["A"]);
        assert_eq!(
            s.jump_to_group(&id("Z")),
            Err(SessionError::UnknownGroup("Z".into()))
        );
        s.jump_to_group(&id("A")).unwrap();
    }

    #[test]
    fn rating_and_rejection_are_exclusive() {
        let mut s = session(&["A"]);

        s.reject().unwrap();
        s.rate(2).unwrap();
        let d = s.current().unwrap().decision();
        assert!(!d.is_rejected());
        assert_eq!(d.rating().stars(), 2);

        s.reject().unwrap();
        let d = s.current().unwrap().decision();
        assert!(d.is_rejected());
        assert_eq!(d.rating(), Rating::UNRATED);
    }

    #[test]
    fn rate_zero_keeps_rejection() {
        let mut s = session(&["A"]);
        s.reject().unwrap();
        s.rate(0).unwrap();
        assert!(s.current().unwrap().decision().is_rejected());
    }

    #[test]
    fn invalid_rating_is_refused() {
        let mut s = session(&["A"]);
        s.rate(1).unwrap();
        assert_eq!(s.rate(4), Err(SessionError::InvalidRating(4)));
        assert_eq!(s.current().unwrap().decision().rating().stars(), 1);
    }

    #[test]
    fn toggle_reject_flips() {
        let mut s = session(&["A"]);
        s.rate(3).unwrap();
        s.toggle_reject().unwrap();
        assert!(s.current().unwrap().decision().is_rejected());
        s.toggle_reject().unwrap();
        assert!(s.current().unwrap().decision().is_undecided());
    }

    #[test]
    fn next_undecided_skips_decided_groups() {
        let mut s = session(&["A", "B", "C", "D"]);
        s.decide(&id("B"), Decision::rejected_decision()).unwrap();
        s.decide(&id("C"), Decision::rated(Rating::new(1).unwrap())).unwrap();

        assert!(s.next_undecided());
        assert_eq!(s.cursor(), Some(3));
        assert!(!s.next_undecided());
        assert_eq!(s.cursor(), Some(3));
    }

    #[test]
    fn stats_count_each_category() {
        let mut s = session(&["A", "B", "C", "D"]);
        s.decide(&id("A"), Decision::rated(Rating::new(3).unwrap())).unwrap();
        s.decide(&id("B"), Decision::rated(Rating::new(1).unwrap())).unwrap();
        s.decide(&id("C"), Decision::rejected_decision()).unwrap();

        let stats = s.stats(100.0);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.rated, [1, 0, 1]);
        assert_eq!(stats.selected(), 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.undecided, 1);
        assert_eq!(stats.blur_pending, 4);

        let selected: Vec<_> = s.selected().map(|g| g.id().as_str()).collect();
        assert_eq!(selected, vec!["A", "B"]);
        assert_eq!(s.rejected().count(), 1);
    }

    #[test]
    fn restore_of_snapshot_is_a_fixed_point() {
        let mut s = session(&["A", "B", "C"]);
        s.rate(2).unwrap();
        s.jump(2).unwrap();
        s.reject().unwrap();

        let snapshot = s.snapshot();
        let mut restored = session(&["A", "B", "C"]);
        restored.restore(&snapshot);

        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.cursor(), Some(2));
    }

    #[test]
    fn restore_resets_absent_groups_and_drops_stale_entries() {
        let mut s = session(&["A", "B"]);
        s.decide(&id("B"), Decision::rejected_decision()).unwrap();

        let mut snapshot = SessionSnapshot::default();
        snapshot
            .decisions
            .insert(id("A"), Decision::rated(Rating::new(1).unwrap()));
        snapshot.decisions.insert(id("gone"), Decision::rejected_decision());

        let summary = s.restore(&snapshot);

        assert_eq!(summary, RestoreSummary { applied: 1, dropped: 1 });
        assert!(s.group(&id("B")).unwrap().decision().is_undecided());
        assert!(s.group(&id("A")).unwrap().decision().is_selected());
    }

    #[test]
    fn rescan_carries_decisions_and_cursor() {
        let mut s = session(&["A", "B", "C"]);
        s.jump(1).unwrap();
        s.rate(2).unwrap();

        let scan = ScanResult {
            root: PathBuf::from("/shoot"),
            groups: vec![files("0"), files("A"), files("B")],
            ..ScanResult::default()
        };
        s.rescan(scan);

        assert_eq!(s.len(), 3);
        assert_eq!(s.current().unwrap().id().as_str(), "B");
        assert_eq!(s.current().unwrap().decision().rating().stars(), 2);
        assert!(s.group(&id("C")).is_none());
    }

    #[test]
    fn apply_merges_enrichment_and_ignores_unknown_groups() {
        let mut s = session(&["A"]);
        let stamp = FileStamp::new(10, SystemTime::UNIX_EPOCH);

        let mut metadata = PhotoMetadata::new();
        metadata.insert(
            MetadataField::CameraModel,
            MetadataValue::Text("X100V".into()),
            StrategyKind::JpegExif,
        );
        let applied = s.apply(Enrichment::new(
            id("A"),
            EnrichmentKind::Metadata {
                result: ExtractionResult {
                    metadata,
                    ..ExtractionResult::default()
                },
                source: PathBuf::from("/shoot/A.jpg"),
                stamp,
            },
        ));
        assert!(applied);
        assert!(s.apply(Enrichment::new(
            id("A"),
            EnrichmentKind::Blur(Cached::new(42.0, PathBuf::from("/shoot/A.jpg"), stamp)),
        )));
        assert!(!s.apply(Enrichment::new(id("Z"), EnrichmentKind::Cancelled)));
        assert!(!s.apply(Enrichment::new(
            id("A"),
            EnrichmentKind::Failed {
                reason: "boom".into()
            }
        )));

        let group = s.group(&id("A")).unwrap();
        assert_eq!(group.metadata().unwrap().camera_model(), Some("X100V"));
        assert_eq!(group.blur_score(), Some(42.0));
        assert_eq!(s.blurry(100.0).count(), 1);
        assert_eq!(s.stats(100.0).blurry, 1);
    }

    #[test]
    fn mutations_emit_session_events() {
        let (sender, receiver) = EventChannel::new();
        let mut s = session(&["A", "B"]).with_events(sender);

        s.advance();
        s.rate(1).unwrap();

        let events: Vec<Event> = receiver.try_iter().collect();
        assert!(matches!(
            events[0],
            Event::Session(SessionEvent::CursorMoved { index: 1, .. })
        ));
        assert!(matches!(
            events[1],
            Event::Session(SessionEvent::DecisionChanged {
                rating: 1,
                rejected: false,
                ..
            })
        ));
    }
}
