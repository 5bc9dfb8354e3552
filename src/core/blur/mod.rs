//! # Blur Module
//!
//! Sharpness scoring for culling decisions.
//!
//! Scores come from a pluggable [`SharpnessMetric`] (Laplacian variance by
//! default) and are cached per preview file, keyed by path plus
//! [`FileStamp`](crate::core::cache::FileStamp). Whether a score counts as
//! blurry is a separate, pure decision: [`is_blurry`].
//!
//! ## Score range
//! Scores are clamped to `[0, MAX_SHARPNESS]`. Higher is sharper; a flat
//! grey frame scores 0.

mod metric;
mod scorer;

pub use metric::{LaplacianVariance, SharpnessMetric};
pub use scorer::{BlurOutcome, BlurScorer};

/// Upper bound of the score range: `2040²`.
///
/// The 4-neighbour Laplacian of 8-bit pixels lies in `[-1020, 1020]`, so
/// its variance can never exceed this.
pub const MAX_SHARPNESS: f64 = 2040.0 * 2040.0;

/// Default threshold below which a photo is flagged blurry
pub const DEFAULT_BLUR_THRESHOLD: f64 = 100.0;

/// Whether a score falls below the blur threshold
pub fn is_blurry(score: f64, threshold: f64) -> bool {
    score < threshold
}

/// Clamp a raw metric output into the score range; NaN becomes 0.
pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, MAX_SHARPNESS)
    }
}
