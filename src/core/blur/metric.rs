//! Sharpness metrics.

use super::clamp_score;
use crate::core::preview::downscale_to_gray;
use image::{DynamicImage, GrayImage};
use tracing::debug;

/// Measures how sharp an image is; higher = sharper
///
/// Implement this trait to swap in another blur detector (e.g. an ML model).
pub trait SharpnessMetric: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw sharpness; the scorer clamps it into the score range.
    fn measure(&self, image: &DynamicImage) -> f64;
}

/// Variance of the 4-neighbour Laplacian over a grayscale preview
///
/// The Laplacian operator detects edges. Sharp images have more defined
/// edges, resulting in higher variance in the Laplacian output.
#[derive(Debug, Clone, Copy)]
pub struct LaplacianVariance {
    /// Longest edge to resize to before analysis (smaller = faster)
    analysis_size: u32,
}

impl Default for LaplacianVariance {
    fn default() -> Self {
        Self { analysis_size: 512 }
    }
}

impl LaplacianVariance {
    pub fn new(analysis_size: u32) -> Self {
        Self {
            analysis_size: analysis_size.max(3),
        }
    }

    pub fn analysis_size(&self) -> u32 {
        self.analysis_size
    }

    fn prepare(&self, image: &DynamicImage) -> GrayImage {
        match downscale_to_gray(image, self.analysis_size) {
            Ok(gray) => gray,
            Err(e) => {
                debug!("Fast resize failed ({}), using image crate", e);
                image
                    .resize(
                        self.analysis_size,
                        self.analysis_size,
                        image::imageops::FilterType::Triangle,
                    )
                    .to_luma8()
            }
        }
    }
}

impl SharpnessMetric for LaplacianVariance {
    fn name(&self) -> &'static str {
        "laplacian-variance"
    }

    fn measure(&self, image: &DynamicImage) -> f64 {
        clamp_score(laplacian_variance(&self.prepare(image)))
    }
}

/// Laplacian kernel: [0, 1, 0; 1, -4, 1; 0, 1, 0]
fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut n = 0.0;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let center = gray.get_pixel(x, y)[0] as f64;
            let top = gray.get_pixel(x, y - 1)[0] as f64;
            let bottom = gray.get_pixel(x, y + 1)[0] as f64;
            let left = gray.get_pixel(x - 1, y)[0] as f64;
            let right = gray.get_pixel(x + 1, y)[0] as f64;

            let laplacian = top + bottom + left + right - 4.0 * center;
            sum += laplacian;
            sum_sq += laplacian * laplacian;
            n += 1.0;
        }
    }

    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}
