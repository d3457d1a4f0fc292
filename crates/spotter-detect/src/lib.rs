//! Detector abstraction for the upload pipeline.
//!
//! The pipeline only sees the [`Detector`] trait: an opaque capability that
//! maps an image file to an annotated copy plus an ordered list of labels.
//! `ContourDetector` is the production implementation; `FakeDetector` gives
//! tests deterministic labels without touching real image analysis.

mod contour;
mod fake;

pub use contour::ContourDetector;
pub use fake::FakeDetector;

use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("unreadable image: {0}")]
    Unreadable(#[from] image::ImageError),

    #[error("{0}")]
    Failed(String),
}

/// Output of a single detector run.
#[derive(Debug)]
pub struct Detection {
    /// Detected object labels, in detector order. May be empty.
    pub labels: Vec<String>,
    /// Copy of the input with detection boxes drawn on it.
    pub annotated: DynamicImage,
}

/// An object detector. Implementations are constructed once at startup and
/// shared across requests; `detect` must be safe to call from a blocking
/// worker thread.
pub trait Detector: Send + Sync {
    fn detect(&self, path: &Path) -> Result<Detection, DetectError>;
}
