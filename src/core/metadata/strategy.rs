//! Metadata strategy trait definition.

use super::PhotoMetadata;
use crate::core::group::GroupFiles;
use crate::error::MetadataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Identifies which strategy supplied a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    JpegExif,
    RawExif,
    RawDecoder,
    FilesystemTimestamp,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::JpegExif => "jpeg-exif",
            StrategyKind::RawExif => "raw-exif",
            StrategyKind::RawDecoder => "raw-decoder",
            StrategyKind::FilesystemTimestamp => "filesystem",
        };
        f.write_str(name)
    }
}

/// One way of reading metadata for a group
///
/// Implement this trait to plug in another reader (e.g. an external
/// `exiftool` process, or a fake in tests).
pub trait MetadataStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// The file this strategy would read, or `None` if it does not apply
    fn source<'a>(&self, files: &'a GroupFiles) -> Option<&'a Path>;

    /// Read whatever fields the file provides
    fn extract(&self, path: &Path) -> Result<PhotoMetadata, MetadataError>;
}
