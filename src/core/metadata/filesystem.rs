//! Last-resort capture time from the filesystem.

use super::{MetadataField, MetadataStrategy, MetadataValue, PhotoMetadata, StrategyKind};
use crate::core::group::GroupFiles;
use crate::error::MetadataError;
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;

/// Modification time of the group's primary file, as local time
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemTimestamp;

impl MetadataStrategy for FilesystemTimestamp {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FilesystemTimestamp
    }

    fn source<'a>(&self, files: &'a GroupFiles) -> Option<&'a Path> {
        Some(files.primary_path())
    }

    fn extract(&self, path: &Path) -> Result<PhotoMetadata, MetadataError> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| MetadataError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let local: DateTime<Local> = modified.into();
        let mut metadata = PhotoMetadata::new();
        metadata.insert(
            MetadataField::Timestamp,
            MetadataValue::Timestamp(local.naive_local()),
            self.kind(),
        );
        Ok(metadata)
    }
}
