//! EXIF strategies backed by kamadak-exif.
//!
//! The same reader handles JPEG (APP1 segment) and TIFF-based RAW
//! containers; the two strategies differ only in which file they read.

use super::{MetadataField, MetadataStrategy, MetadataValue, PhotoMetadata, StrategyKind};
use crate::core::group::GroupFiles;
use crate::error::MetadataError;
use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// EXIF embedded in the group's JPEG
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegExif;

/// EXIF/TIFF container of the group's RAW file
#[derive(Debug, Default, Clone, Copy)]
pub struct RawExif;

impl MetadataStrategy for JpegExif {
    fn kind(&self) -> StrategyKind {
        StrategyKind::JpegExif
    }

    fn source<'a>(&self, files: &'a GroupFiles) -> Option<&'a Path> {
        files.jpeg_path()
    }

    fn extract(&self, path: &Path) -> Result<PhotoMetadata, MetadataError> {
        read_exif(path, self.kind())
    }
}

impl MetadataStrategy for RawExif {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RawExif
    }

    fn source<'a>(&self, files: &'a GroupFiles) -> Option<&'a Path> {
        files.raw_path()
    }

    fn extract(&self, path: &Path) -> Result<PhotoMetadata, MetadataError> {
        read_exif(path, self.kind())
    }
}

fn read_exif(path: &Path, kind: StrategyKind) -> Result<PhotoMetadata, MetadataError> {
    let file = File::open(path).map_err(|e| MetadataError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut bufreader = BufReader::new(&file);
    let exif = Reader::new()
        .read_from_container(&mut bufreader)
        .map_err(|e| MetadataError::Exif {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(fields_from_exif(&exif, kind))
}

fn fields_from_exif(exif: &Exif, kind: StrategyKind) -> PhotoMetadata {
    let mut metadata = PhotoMetadata::new();
    let get = |tag: Tag| exif.get_field(tag, In::PRIMARY).map(|f| &f.value);

    if let Some(make) = get(Tag::Make).and_then(get_string_value) {
        metadata.insert(MetadataField::CameraMake, MetadataValue::Text(make), kind);
    }
    if let Some(model) = get(Tag::Model).and_then(get_string_value) {
        metadata.insert(MetadataField::CameraModel, MetadataValue::Text(model), kind);
    }
    if let Some(lens) = get(Tag::LensModel).and_then(get_string_value) {
        metadata.insert(MetadataField::Lens, MetadataValue::Text(lens), kind);
    }

    if let Some(t) = get(Tag::ExposureTime).and_then(get_f64_value) {
        metadata.insert(MetadataField::ExposureTime, MetadataValue::Number(t), kind);
    }
    if let Some(f) = get(Tag::FNumber).and_then(get_f64_value) {
        metadata.insert(MetadataField::FNumber, MetadataValue::Number(f), kind);
    }
    if let Some(iso) = get(Tag::PhotographicSensitivity).and_then(get_u32_value) {
        metadata.insert(MetadataField::Iso, MetadataValue::Integer(iso), kind);
    }
    if let Some(mm) = get(Tag::FocalLength).and_then(get_f64_value) {
        metadata.insert(MetadataField::FocalLength, MetadataValue::Number(mm), kind);
    }

    // EXIF date format: "YYYY:MM:DD HH:MM:SS"
    let taken = get(Tag::DateTimeOriginal)
        .or_else(|| get(Tag::DateTime))
        .and_then(get_string_value)
        .and_then(|s| NaiveDateTime::parse_from_str(&s, "%Y:%m:%d %H:%M:%S").ok());
    if let Some(taken) = taken {
        metadata.insert(MetadataField::Timestamp, MetadataValue::Timestamp(taken), kind);
    }

    // Prefer actual pixel dimensions over the TIFF image tags
    let width = get(Tag::PixelXDimension)
        .and_then(get_u32_value)
        .or_else(|| get(Tag::ImageWidth).and_then(get_u32_value));
    let height = get(Tag::PixelYDimension)
        .and_then(get_u32_value)
        .or_else(|| get(Tag::ImageLength).and_then(get_u32_value));
    if let Some(width) = width {
        metadata.insert(MetadataField::Width, MetadataValue::Integer(width), kind);
    }
    if let Some(height) = height {
        metadata.insert(MetadataField::Height, MetadataValue::Integer(height), kind);
    }

    if let Some(orientation) = get(Tag::Orientation).and_then(get_u32_value) {
        metadata.insert(MetadataField::Orientation, MetadataValue::Integer(orientation), kind);
    }

    metadata
}

/// Helper to extract u32 from various EXIF value types
fn get_u32_value(value: &Value) -> Option<u32> {
    match value {
        Value::Long(vec) => vec.first().copied(),
        Value::Short(vec) => vec.first().map(|v| *v as u32),
        _ => None,
    }
}

/// Rationals (exposure, aperture, focal length) as floating point
fn get_f64_value(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Rational(vec) => vec.first().filter(|r| r.denom != 0)?.to_f64(),
        Value::SRational(vec) => vec.first().filter(|r| r.denom != 0)?.to_f64(),
        Value::Long(vec) => *vec.first()? as f64,
        Value::Short(vec) => *vec.first()? as f64,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Helper to extract string from EXIF ASCII value
fn get_string_value(value: &Value) -> Option<String> {
    if let Value::Ascii(ref vec) = value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}
