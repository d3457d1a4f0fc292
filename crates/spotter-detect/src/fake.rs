use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};

use crate::{DetectError, Detection, Detector};

/// Deterministic detector for tests: returns a fixed label list (or a fixed
/// failure) without doing any image analysis.
pub struct FakeDetector {
    labels: Vec<String>,
    failure: Option<String>,
}

impl FakeDetector {
    pub fn with_labels(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            failure: None,
        }
    }

    pub fn empty() -> Self {
        Self::with_labels(&[])
    }

    pub fn failing(message: &str) -> Self {
        Self {
            labels: Vec::new(),
            failure: Some(message.to_string()),
        }
    }
}

impl Detector for FakeDetector {
    fn detect(&self, path: &Path) -> Result<Detection, DetectError> {
        if let Some(message) = &self.failure {
            return Err(DetectError::Failed(message.clone()));
        }

        // The pipeline must have written the stored file before invoking us.
        if !path.exists() {
            return Err(DetectError::Failed(format!(
                "missing input file: {}",
                path.display()
            )));
        }

        Ok(Detection {
            labels: self.labels.clone(),
            annotated: DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_configured_labels() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("input.png");
        std::fs::write(&path, b"bytes").unwrap();

        let detection = FakeDetector::with_labels(&["dog", "person"])
            .detect(&path)
            .unwrap();
        assert_eq!(detection.labels, vec!["dog", "person"]);
    }

    #[test]
    fn failing_variant_always_errors() {
        let err = FakeDetector::failing("boom")
            .detect(Path::new("/nonexistent"))
            .unwrap_err();
        assert!(matches!(err, DetectError::Failed(_)));
    }
}
