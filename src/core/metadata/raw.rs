//! Secondary RAW reader for files the EXIF parser rejects.

use super::{MetadataField, MetadataStrategy, MetadataValue, PhotoMetadata, StrategyKind};
use crate::core::group::GroupFiles;
use crate::error::MetadataError;
use std::path::Path;

/// Camera make/model and sensor dimensions via `rawloader`
///
/// Decoding reads the whole sensor payload, so this strategy sits after the
/// EXIF readers and only runs when they left capture metadata incomplete.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawDecoder;

impl MetadataStrategy for RawDecoder {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RawDecoder
    }

    fn source<'a>(&self, files: &'a GroupFiles) -> Option<&'a Path> {
        files.raw_path()
    }

    fn extract(&self, path: &Path) -> Result<PhotoMetadata, MetadataError> {
        if !path.exists() {
            return Err(MetadataError::Io {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        let image = rawloader::decode_file(path).map_err(|e| MetadataError::Raw {
            path: path.to_path_buf(),
            reason: format!("{:?}", e),
        })?;

        let kind = self.kind();
        let mut metadata = PhotoMetadata::new();

        let make = image.make.trim();
        if !make.is_empty() {
            metadata.insert(MetadataField::CameraMake, MetadataValue::Text(make.to_string()), kind);
        }
        let model = image.model.trim();
        if !model.is_empty() {
            metadata.insert(MetadataField::CameraModel, MetadataValue::Text(model.to_string()), kind);
        }
        if image.width > 0 && image.height > 0 {
            metadata.insert(MetadataField::Width, MetadataValue::Integer(image.width as u32), kind);
            metadata.insert(MetadataField::Height, MetadataValue::Integer(image.height as u32), kind);
        }

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn garbage_raw_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IMG_001.CR2");
        std::fs::write(&path, b"definitely not a raw file").unwrap();

        let result = RawDecoder.extract(&path);
        assert!(matches!(result, Err(MetadataError::Raw { .. })));
    }

    #[test]
    fn missing_raw_is_io_failure() {
        let result = RawDecoder.extract(Path::new("/nonexistent/IMG_001.NEF"));
        assert!(matches!(result, Err(MetadataError::Io { .. })));
    }

    #[test]
    fn jpeg_only_group_is_not_applicable() {
        let files = GroupFiles::new(
            "".into(),
            "IMG_002".into(),
            None,
            Some("/s/IMG_002.JPG".into()),
        )
        .unwrap();
        assert!(RawDecoder.source(&files).is_none());
    }
}
