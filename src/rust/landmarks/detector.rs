use image::RgbImage;

use super::{ExtractionError, HandLandmarks};

/// Settings handed to the detector for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOptions {
    /// Treat every frame as an unrelated still image (no tracking between calls)
    pub static_image_mode: bool,
    /// Upper bound on the number of hands reported
    pub max_num_hands: usize,
    /// Hands scored below this are not reported
    pub min_detection_confidence: f32,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            static_image_mode: true,
            max_num_hands: 2,
            min_detection_confidence: 0.5,
        }
    }
}

/// An external hand-pose detector.
///
/// Given an RGB frame, implementations return zero or more landmark sets with
/// coordinates normalized to the frame's width and height. Returning an empty
/// vector means no hand was found; `Err` is reserved for detector failures.
pub trait HandDetector: Send + Sync {
    fn detect(
        &self,
        image: &RgbImage,
        options: &DetectionOptions,
    ) -> Result<Vec<HandLandmarks>, ExtractionError>;
}
