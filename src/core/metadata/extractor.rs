//! Runs the strategy chain for one group.

use super::{
    FilesystemTimestamp, JpegExif, MetadataStrategy, PhotoMetadata, RawDecoder, RawExif,
    StrategyKind,
};
use crate::core::group::GroupFiles;
use serde::Serialize;
use tracing::debug;

/// A strategy that ran and failed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyFailure {
    pub strategy: StrategyKind,
    pub reason: String,
}

/// Outcome of one extraction; partial results are normal
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub metadata: PhotoMetadata,
    /// Strategies that ran, in order
    pub attempted: Vec<StrategyKind>,
    pub failures: Vec<StrategyFailure>,
}

/// Ordered chain of metadata strategies
pub struct MetadataExtractor {
    strategies: Vec<Box<dyn MetadataStrategy>>,
}

impl MetadataExtractor {
    /// The default chain: JPEG EXIF, RAW EXIF, RAW decoder, filesystem time
    pub fn new() -> Self {
        Self::with_strategies(vec![
            Box::new(JpegExif),
            Box::new(RawExif),
            Box::new(RawDecoder),
            Box::new(FilesystemTimestamp),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn MetadataStrategy>>) -> Self {
        Self { strategies }
    }

    /// Extract metadata for a group. Never fails; see `failures`.
    pub fn extract(&self, files: &GroupFiles) -> ExtractionResult {
        let mut result = ExtractionResult::default();

        for strategy in &self.strategies {
            if result.metadata.has_capture_metadata() {
                break;
            }
            let Some(path) = strategy.source(files) else {
                continue;
            };

            result.attempted.push(strategy.kind());
            match strategy.extract(path) {
                Ok(found) => result.metadata.fill_from(found),
                Err(e) => {
                    debug!("{} failed for {}: {}", strategy.kind(), files.id(), e);
                    result.failures.push(StrategyFailure {
                        strategy: strategy.kind(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        result
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{MetadataField, MetadataValue};
    use crate::error::MetadataError;
    use chrono::NaiveDate;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns canned fields or a canned failure, counting calls
    struct Fake {
        kind: StrategyKind,
        fields: Vec<(MetadataField, MetadataValue)>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Fake {
        fn ok(kind: StrategyKind, fields: Vec<(MetadataField, MetadataValue)>) -> Self {
            Self {
                kind,
                fields,
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(kind: StrategyKind) -> Self {
            Self {
                fail: true,
                ..Self::ok(kind, vec![])
            }
        }
    }

    impl MetadataStrategy for Fake {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn source<'a>(&self, files: &'a GroupFiles) -> Option<&'a Path> {
            Some(files.primary_path())
        }

        fn extract(&self, path: &Path) -> Result<PhotoMetadata, MetadataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MetadataError::Exif {
                    path: path.to_path_buf(),
                    reason: "truncated IFD".to_string(),
                });
            }
            let mut metadata = PhotoMetadata::new();
            for (field, value) in &self.fields {
                metadata.insert(*field, value.clone(), self.kind);
            }
            Ok(metadata)
        }
    }

    fn files() -> GroupFiles {
        GroupFiles::new(
            PathBuf::new(),
            "IMG_001".into(),
            Some("/s/IMG_001.CR2".into()),
            Some("/s/IMG_001.JPG".into()),
        )
        .unwrap()
    }

    fn text(s: &str) -> MetadataValue {
        MetadataValue::Text(s.to_string())
    }

    fn noon() -> MetadataValue {
        MetadataValue::Timestamp(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn failure_skips_only_that_strategy() {
        let extractor = MetadataExtractor::with_strategies(vec![
            Box::new(Fake::failing(StrategyKind::JpegExif)),
            Box::new(Fake::ok(
                StrategyKind::RawExif,
                vec![(MetadataField::CameraModel, text("Z 9"))],
            )),
        ]);

        let result = extractor.extract(&files());

        assert_eq!(result.metadata.camera_model(), Some("Z 9"));
        assert_eq!(result.attempted, vec![StrategyKind::JpegExif, StrategyKind::RawExif]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].strategy, StrategyKind::JpegExif);
        assert!(result.failures[0].reason.contains("truncated IFD"));
    }

    #[test]
    fn earlier_strategy_wins_conflicting_fields() {
        let extractor = MetadataExtractor::with_strategies(vec![
            Box::new(Fake::ok(
                StrategyKind::JpegExif,
                vec![(MetadataField::CameraModel, text("from jpeg"))],
            )),
            Box::new(Fake::ok(
                StrategyKind::RawExif,
                vec![
                    (MetadataField::CameraModel, text("from raw")),
                    (MetadataField::Lens, text("24-70")),
                ],
            )),
        ]);

        let metadata = extractor.extract(&files()).metadata;

        assert_eq!(metadata.camera_model(), Some("from jpeg"));
        assert_eq!(metadata.lens(), Some("24-70"));
    }

    #[test]
    fn chain_stops_once_capture_metadata_is_complete() {
        let last = Fake::ok(StrategyKind::FilesystemTimestamp, vec![]);
        let calls = Arc::clone(&last.calls);
        let extractor = MetadataExtractor::with_strategies(vec![
            Box::new(Fake::ok(
                StrategyKind::JpegExif,
                vec![
                    (MetadataField::CameraMake, text("Sony")),
                    (MetadataField::ExposureTime, MetadataValue::Number(0.002)),
                    (MetadataField::Timestamp, noon()),
                ],
            )),
            Box::new(last),
        ]);

        let result = extractor.extract(&files());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.attempted, vec![StrategyKind::JpegExif]);
    }

    #[test]
    fn filesystem_fallback_supplies_timestamp_for_unreadable_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let jpeg = dir.path().join("IMG_003.JPG");
        std::fs::write(&jpeg, b"corrupt").unwrap();
        let files = GroupFiles::new(PathBuf::new(), "IMG_003".into(), None, Some(jpeg)).unwrap();

        let result = MetadataExtractor::new().extract(&files);

        assert!(result.metadata.timestamp().is_some());
        assert_eq!(
            result.metadata.get(MetadataField::Timestamp).unwrap().source,
            StrategyKind::FilesystemTimestamp
        );
        assert_eq!(
            result.attempted,
            vec![StrategyKind::JpegExif, StrategyKind::FilesystemTimestamp]
        );
        assert_eq!(result.failures.len(), 1);
    }

    #[test]
    fn everything_failing_still_returns_a_result() {
        let files = GroupFiles::new(
            PathBuf::new(),
            "gone".into(),
            Some("/nonexistent/gone.NEF".into()),
            None,
        )
        .unwrap();

        let result = MetadataExtractor::new().extract(&files);

        assert!(result.metadata.is_empty());
        assert_eq!(result.failures.len(), 3);
    }
}
