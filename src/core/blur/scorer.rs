//! Cached blur scoring for photo groups.

use super::{clamp_score, LaplacianVariance, SharpnessMetric};
use crate::core::cache::{CacheBackend, CacheEntry, Cached, FileStamp, InMemoryCache};
use crate::core::group::GroupFiles;
use crate::core::preview::PreviewDecoder;
use crate::error::DecodeError;
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// A blur score and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct BlurOutcome {
    pub score: f64,
    /// Preview file the score describes
    pub source: PathBuf,
    /// Stamp of `source` when scored; `None` if the file could not be stat'ed
    pub stamp: Option<FileStamp>,
    /// Served from the cache without running the metric
    pub from_cache: bool,
}

impl BlurOutcome {
    /// The score as a validity-tracked value, if the source could be stamped.
    pub fn into_cached(self) -> Option<Cached<f64>> {
        let stamp = self.stamp?;
        Some(Cached::new(self.score, self.source, stamp))
    }
}

/// Scores previews with a sharpness metric, caching by preview file identity
pub struct BlurScorer {
    metric: Box<dyn SharpnessMetric>,
    cache: Arc<dyn CacheBackend>,
}

impl BlurScorer {
    pub fn new(metric: Box<dyn SharpnessMetric>, cache: Arc<dyn CacheBackend>) -> Self {
        Self { metric, cache }
    }

    /// Laplacian variance with a session-only cache
    pub fn in_memory(analysis_size: u32) -> Self {
        Self::new(
            Box::new(LaplacianVariance::new(analysis_size)),
            Arc::new(InMemoryCache::new()),
        )
    }

    pub fn metric_name(&self) -> &'static str {
        self.metric.name()
    }

    pub fn cache(&self) -> &Arc<dyn CacheBackend> {
        &self.cache
    }

    /// A cached score for the group's preview, if still valid
    pub fn lookup(&self, files: &GroupFiles) -> Option<BlurOutcome> {
        let source = files.preview_path();
        let stamp = FileStamp::of(source).ok()?;

        match self.cache.get(source, &stamp) {
            Ok(Some(entry)) => Some(BlurOutcome {
                score: entry.score,
                source: source.to_path_buf(),
                stamp: Some(stamp),
                from_cache: true,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!("Blur cache lookup failed for {}: {}", source.display(), e);
                None
            }
        }
    }

    /// Score a decoded preview of the group.
    ///
    /// A valid cache entry short-circuits the metric. Cache failures are
    /// logged and the score is computed anyway.
    pub fn score(&self, files: &GroupFiles, preview: &DynamicImage) -> BlurOutcome {
        if let Some(hit) = self.lookup(files) {
            debug!("Blur cache hit for {}", files.id());
            return hit;
        }

        let source = files.preview_path();
        let score = clamp_score(self.metric.measure(preview));
        let stamp = FileStamp::of(source).ok();

        match stamp {
            Some(stamp) => {
                if let Err(e) = self.cache.set(CacheEntry::new(source.to_path_buf(), score, stamp)) {
                    warn!("Failed to cache blur score for {}: {}", source.display(), e);
                }
            }
            None => debug!("{} could not be stat'ed; score not cached", source.display()),
        }

        BlurOutcome {
            score,
            source: source.to_path_buf(),
            stamp,
            from_cache: false,
        }
    }

    /// Check the cache, decoding the preview only on a miss.
    pub fn score_with(
        &self,
        files: &GroupFiles,
        decoder: &dyn PreviewDecoder,
    ) -> Result<BlurOutcome, DecodeError> {
        if let Some(hit) = self.lookup(files) {
            return Ok(hit);
        }
        let preview = decoder.decode_preview(files.preview_path())?;
        Ok(self.score(files, &preview))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use std::fs::{self, File};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct CountingMetric {
        calls: Arc<AtomicUsize>,
        value: f64,
    }

    impl SharpnessMetric for CountingMetric {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn measure(&self, _image: &DynamicImage) -> f64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.value
        }
    }

    fn scorer(value: f64) -> (BlurScorer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let metric = CountingMetric {
            calls: Arc::clone(&calls),
            value,
        };
        (
            BlurScorer::new(Box::new(metric), Arc::new(InMemoryCache::new())),
            calls,
        )
    }

    fn group_with_jpeg(dir: &Path) -> GroupFiles {
        let jpeg = dir.join("IMG_001.JPG");
        fs::write(&jpeg, b"preview bytes").unwrap();
        GroupFiles::new(PathBuf::new(), "IMG_001".into(), None, Some(jpeg)).unwrap()
    }

    fn preview() -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(8, 8, |x, _| Luma([(x * 30) as u8])))
    }

    #[test]
    fn second_score_is_served_from_cache() {
        let dir = TempDir::new().unwrap();
        let files = group_with_jpeg(dir.path());
        let (scorer, calls) = scorer(250.0);

        let first = scorer.score(&files, &preview());
        let second = scorer.score(&files, &preview());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.score, 250.0);
    }

    #[test]
    fn modified_preview_forces_recompute() {
        let dir = TempDir::new().unwrap();
        let files = group_with_jpeg(dir.path());
        let (scorer, calls) = scorer(250.0);

        scorer.score(&files, &preview());

        let file = File::options().write(true).open(files.preview_path()).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(3600))
            .unwrap();
        drop(file);

        let again = scorer.score(&files, &preview());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!again.from_cache);
    }

    #[test]
    fn touch_within_the_same_second_forces_recompute() {
        let dir = TempDir::new().unwrap();
        let files = group_with_jpeg(dir.path());
        let (scorer, calls) = scorer(250.0);
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        let file = File::options().write(true).open(files.preview_path()).unwrap();
        file.set_modified(base + Duration::from_millis(100)).unwrap();
        scorer.score(&files, &preview());

        file.set_modified(base + Duration::from_millis(900)).unwrap();
        drop(file);

        let again = scorer.score(&files, &preview());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!again.from_cache);
    }

    #[test]
    fn cache_key_is_the_jpeg_when_present() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("IMG_001.CR2");
        let jpeg = dir.path().join("IMG_001.JPG");
        fs::write(&raw, b"raw").unwrap();
        fs::write(&jpeg, b"jpeg").unwrap();
        let files =
            GroupFiles::new(PathBuf::new(), "IMG_001".into(), Some(raw), Some(jpeg.clone())).unwrap();
        let (scorer, _) = scorer(10.0);

        let outcome = scorer.score(&files, &preview());

        assert_eq!(outcome.source, jpeg);
        assert_eq!(scorer.cache().stats().unwrap().total_entries, 1);
    }

    #[test]
    fn out_of_range_metric_output_is_clamped() {
        let dir = TempDir::new().unwrap();
        let files = group_with_jpeg(dir.path());
        let (scorer, _) = scorer(-5.0);

        assert_eq!(scorer.score(&files, &preview()).score, 0.0);
    }

    #[test]
    fn missing_preview_is_scored_but_not_cached() {
        let files = GroupFiles::new(
            PathBuf::new(),
            "gone".into(),
            None,
            Some(PathBuf::from("/nonexistent/gone.jpg")),
        )
        .unwrap();
        let (scorer, _) = scorer(42.0);

        let outcome = scorer.score(&files, &preview());

        assert_eq!(outcome.score, 42.0);
        assert!(outcome.stamp.is_none());
        assert!(outcome.into_cached().is_none());
        assert_eq!(scorer.cache().stats().unwrap().total_entries, 0);
    }

    #[test]
    fn score_with_skips_decoding_on_cache_hit() {
        struct FailingDecoder;
        impl PreviewDecoder for FailingDecoder {
            fn decode_preview(&self, path: &Path) -> Result<DynamicImage, DecodeError> {
                Err(DecodeError::Unsupported {
                    path: path.to_path_buf(),
                })
            }
        }

        let dir = TempDir::new().unwrap();
        let files = group_with_jpeg(dir.path());
        let (scorer, _) = scorer(300.0);

        assert!(scorer.score_with(&files, &FailingDecoder).is_err());
        scorer.score(&files, &preview());
        assert_eq!(scorer.score_with(&files, &FailingDecoder).unwrap().score, 300.0);
    }
}
