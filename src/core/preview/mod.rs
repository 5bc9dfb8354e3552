//! # Preview Module
//!
//! Decodes the image the blur scorer looks at.
//!
//! The scorer never touches files itself; it is handed a decoded preview by
//! a [`PreviewDecoder`]. The default decoder handles:
//! - JPEG files, via zune-jpeg with an `image` crate fallback
//! - RAW files, by locating the largest JPEG preview embedded in the
//!   container (sensor data is never demosaiced)

mod bytes;
mod decode;
mod resize;

pub use bytes::{read_file_bytes, FileBytes};
pub use decode::DefaultPreviewDecoder;
pub use resize::{downscale_to_gray, fit_within};

use crate::error::DecodeError;
use image::DynamicImage;
use std::path::Path;

/// Turns a photo file into pixels for analysis
pub trait PreviewDecoder: Send + Sync {
    fn decode_preview(&self, path: &Path) -> Result<DynamicImage, DecodeError>;
}
