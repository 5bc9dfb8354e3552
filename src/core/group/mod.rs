//! # Photo Groups
//!
//! A [`PhotoGroup`] is the unit of decision: a RAW file and/or a JPEG file
//! sharing a basename in the same directory, plus everything learned about
//! them during the session.

mod decision;

pub use decision::{Decision, Rating};

use crate::core::cache::{Cached, FileStamp};
use crate::core::metadata::PhotoMetadata;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable identity of a group: relative directory plus basename.
///
/// `IMG_001` for a photo at the scan root, `day1/IMG_001` below it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Build an id from a directory relative to the scan root and a basename
    pub fn new(relative_dir: &Path, basename: &str) -> Self {
        let mut parts: Vec<String> = relative_dir
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .filter(|c| !c.is_empty() && c != ".")
            .collect();
        parts.push(basename.to_string());
        GroupId(parts.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        GroupId(value.to_string())
    }
}

impl Borrow<str> for GroupId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which files a group holds; a group is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Members {
    Raw(PathBuf),
    Jpeg(PathBuf),
    Pair { raw: PathBuf, jpeg: PathBuf },
}

/// The files that make up one photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFiles {
    id: GroupId,
    relative_dir: PathBuf,
    basename: String,
    members: Members,
}

impl GroupFiles {
    /// Returns `None` when neither a RAW nor a JPEG path is given.
    pub fn new(
        relative_dir: PathBuf,
        basename: String,
        raw_path: Option<PathBuf>,
        jpeg_path: Option<PathBuf>,
    ) -> Option<Self> {
        let members = match (raw_path, jpeg_path) {
            (Some(raw), Some(jpeg)) => Members::Pair { raw, jpeg },
            (Some(raw), None) => Members::Raw(raw),
            (None, Some(jpeg)) => Members::Jpeg(jpeg),
            (None, None) => return None,
        };
        Some(Self {
            id: GroupId::new(&relative_dir, &basename),
            relative_dir,
            basename,
            members,
        })
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Directory relative to the scan root
    pub fn relative_dir(&self) -> &Path {
        &self.relative_dir
    }

    pub fn raw_path(&self) -> Option<&Path> {
        match &self.members {
            Members::Raw(raw) | Members::Pair { raw, .. } => Some(raw),
            Members::Jpeg(_) => None,
        }
    }

    pub fn jpeg_path(&self) -> Option<&Path> {
        match &self.members {
            Members::Jpeg(jpeg) | Members::Pair { jpeg, .. } => Some(jpeg),
            Members::Raw(_) => None,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self.members, Members::Pair { .. })
    }

    /// The file treated as "the photo": RAW when present
    pub fn primary_path(&self) -> &Path {
        match &self.members {
            Members::Raw(raw) | Members::Pair { raw, .. } => raw,
            Members::Jpeg(jpeg) => jpeg,
        }
    }

    /// The file previews are decoded from: JPEG when present
    pub fn preview_path(&self) -> &Path {
        match &self.members {
            Members::Jpeg(jpeg) | Members::Pair { jpeg, .. } => jpeg,
            Members::Raw(raw) => raw,
        }
    }

    /// All member files, RAW first
    pub fn paths(&self) -> Vec<&Path> {
        match &self.members {
            Members::Raw(path) | Members::Jpeg(path) => vec![path.as_path()],
            Members::Pair { raw, jpeg } => vec![raw.as_path(), jpeg.as_path()],
        }
    }
}

/// One photo in a culling session
#[derive(Debug, Clone)]
pub struct PhotoGroup {
    files: GroupFiles,
    metadata: Option<Cached<PhotoMetadata>>,
    blur: Option<Cached<f64>>,
    decision: Decision,
}

impl PhotoGroup {
    pub fn new(files: GroupFiles) -> Self {
        Self {
            files,
            metadata: None,
            blur: None,
            decision: Decision::default(),
        }
    }

    pub fn id(&self) -> &GroupId {
        self.files.id()
    }

    pub fn files(&self) -> &GroupFiles {
        &self.files
    }

    pub fn raw_path(&self) -> Option<&Path> {
        self.files.raw_path()
    }

    pub fn jpeg_path(&self) -> Option<&Path> {
        self.files.jpeg_path()
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// Extracted metadata; `None` while extraction is pending.
    pub fn metadata(&self) -> Option<&PhotoMetadata> {
        self.metadata.as_ref().map(|m| &m.value)
    }

    /// Sharpness score; `None` while scoring is pending.
    pub fn blur_score(&self) -> Option<f64> {
        self.blur.as_ref().map(|b| b.value)
    }

    pub fn blur(&self) -> Option<&Cached<f64>> {
        self.blur.as_ref()
    }

    /// Metadata was never extracted or its source file changed since.
    pub fn needs_metadata(&self) -> bool {
        self.metadata.as_ref().map_or(true, |m| !m.is_fresh())
    }

    /// Blur was never scored or the preview file changed since.
    pub fn needs_blur(&self) -> bool {
        self.blur.as_ref().map_or(true, |b| !b.is_fresh())
    }

    pub(crate) fn set_decision(&mut self, decision: Decision) {
        self.decision = decision;
    }

    /// Merge freshly extracted metadata without dropping known fields.
    pub(crate) fn merge_metadata(&mut self, metadata: PhotoMetadata, source: PathBuf, stamp: FileStamp) {
        match self.metadata.as_mut() {
            Some(existing) => {
                existing.value.merge(metadata);
                existing.source = source;
                existing.stamp = stamp;
            }
            None => self.metadata = Some(Cached::new(metadata, source, stamp)),
        }
    }

    pub(crate) fn set_blur(&mut self, blur: Cached<f64>) {
        self.blur = Some(blur);
    }
}
