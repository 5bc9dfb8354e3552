//! # Metadata Module
//!
//! Best-effort capture metadata for photo groups.
//!
//! ## Strategy chain
//! Extraction runs an ordered list of [`MetadataStrategy`]s:
//! 1. EXIF embedded in the JPEG
//! 2. EXIF/TIFF container of the RAW (CR2, NEF, ARW, DNG, ...)
//! 3. `rawloader` for RAW files the EXIF reader rejects
//! 4. Filesystem modification time, as a last-resort timestamp
//!
//! A failing strategy only skips itself. The first strategy to supply a
//! field wins, and the chain stops once camera, exposure and capture time
//! are all known.

mod exif_reader;
mod extractor;
mod filesystem;
mod raw;
mod strategy;

pub use exif_reader::{JpegExif, RawExif};
pub use extractor::{ExtractionResult, MetadataExtractor, StrategyFailure};
pub use filesystem::FilesystemTimestamp;
pub use raw::RawDecoder;
pub use strategy::{MetadataStrategy, StrategyKind};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fields the extractor knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    CameraMake,
    CameraModel,
    Lens,
    ExposureTime,
    FNumber,
    Iso,
    FocalLength,
    Timestamp,
    Width,
    Height,
    Orientation,
}

/// A metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataValue {
    Text(String),
    Integer(u32),
    /// Seconds, millimetres or an f-stop, depending on the field
    Number(f64),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Text(s) => write!(f, "{s}"),
            MetadataValue::Integer(n) => write!(f, "{n}"),
            MetadataValue::Number(n) => write!(f, "{n}"),
            MetadataValue::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// A value plus the strategy that supplied it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: MetadataValue,
    pub source: StrategyKind,
}

/// Extracted photo metadata; any field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoMetadata {
    fields: BTreeMap<MetadataField, FieldValue>,
}

impl PhotoMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: MetadataField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, field: MetadataField, value: MetadataValue, source: StrategyKind) {
        self.fields.insert(field, FieldValue { value, source });
    }

    /// Fill in fields this result lacks; existing fields are kept.
    pub fn fill_from(&mut self, other: PhotoMetadata) {
        for (field, value) in other.fields {
            self.fields.entry(field).or_insert(value);
        }
    }

    /// Merge a newer result: its fields replace ours, fields it lacks stay.
    pub fn merge(&mut self, newer: PhotoMetadata) {
        self.fields.extend(newer.fields);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataField, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    /// Camera, exposure and capture time are all known
    pub fn has_capture_metadata(&self) -> bool {
        (self.camera_make().is_some() || self.camera_model().is_some())
            && self.exposure_time().is_some()
            && self.timestamp().is_some()
    }

    fn text(&self, field: MetadataField) -> Option<&str> {
        match self.get(field).map(|f| &f.value) {
            Some(MetadataValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    fn number(&self, field: MetadataField) -> Option<f64> {
        match self.get(field).map(|f| &f.value) {
            Some(MetadataValue::Number(n)) => Some(*n),
            Some(MetadataValue::Integer(n)) => Some(*n as f64),
            _ => None,
        }
    }

    fn integer(&self, field: MetadataField) -> Option<u32> {
        match self.get(field).map(|f| &f.value) {
            Some(MetadataValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn camera_make(&self) -> Option<&str> {
        self.text(MetadataField::CameraMake)
    }

    pub fn camera_model(&self) -> Option<&str> {
        self.text(MetadataField::CameraModel)
    }

    pub fn lens(&self) -> Option<&str> {
        self.text(MetadataField::Lens)
    }

    /// Exposure time in seconds
    pub fn exposure_time(&self) -> Option<f64> {
        self.number(MetadataField::ExposureTime)
    }

    pub fn f_number(&self) -> Option<f64> {
        self.number(MetadataField::FNumber)
    }

    pub fn iso(&self) -> Option<u32> {
        self.integer(MetadataField::Iso)
    }

    /// Focal length in millimetres
    pub fn focal_length(&self) -> Option<f64> {
        self.number(MetadataField::FocalLength)
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self.get(MetadataField::Timestamp).map(|f| &f.value) {
            Some(MetadataValue::Timestamp(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        Some((
            self.integer(MetadataField::Width)?,
            self.integer(MetadataField::Height)?,
        ))
    }

    /// EXIF orientation (1-8, where 1 is normal)
    pub fn orientation(&self) -> Option<u32> {
        self.integer(MetadataField::Orientation)
    }

    /// Camera name for display, "unknown" when missing
    pub fn camera_display(&self) -> String {
        match (self.camera_make(), self.camera_model()) {
            (Some(make), Some(model)) => {
                // Avoid duplication like "Canon Canon EOS R5"
                if model.starts_with(make) {
                    model.to_string()
                } else {
                    format!("{} {}", make, model)
                }
            }
            (None, Some(model)) => model.to_string(),
            (Some(make), None) => make.to_string(),
            (None, None) => "unknown".to_string(),
        }
    }

    /// Exposure summary like `1/250s f/2.8 ISO 400 50mm`, "unknown" when empty
    pub fn exposure_display(&self) -> String {
        let mut parts = Vec::new();
        if let Some(t) = self.exposure_time() {
            parts.push(format_shutter(t));
        }
        if let Some(f) = self.f_number() {
            parts.push(format!("f/{}", trim_float(f)));
        }
        if let Some(iso) = self.iso() {
            parts.push(format!("ISO {iso}"));
        }
        if let Some(mm) = self.focal_length() {
            parts.push(format!("{}mm", trim_float(mm)));
        }

        if parts.is_empty() {
            "unknown".to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Get dimensions as a formatted string
    pub fn dimensions_display(&self) -> Option<String> {
        self.dimensions().map(|(w, h)| format!("{}x{}", w, h))
    }
}

fn format_shutter(seconds: f64) -> String {
    if seconds > 0.0 && seconds < 1.0 {
        format!("1/{}s", (1.0 / seconds).round() as u64)
    } else {
        format!("{}s", trim_float(seconds))
    }
}

fn trim_float(value: f64) -> String {
    let s = format!("{:.1}", value);
    s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
}
