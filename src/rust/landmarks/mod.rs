//! Hand landmark extraction: RGB normalization, hand selection and feature flattening.

use std::sync::Arc;

use image::RgbImage;
use log::{error, info, warn};

use crate::decoder::{ChannelOrder, DecodedImage};

mod detector;
pub mod onnx;

pub use detector::{DetectionOptions, HandDetector};
pub use onnx::OnnxHandDetector;

/// Keypoints per detected hand.
pub const LANDMARK_COUNT: usize = 21;
/// Length of the flattened `x1, y1, ..., x21, y21` feature vector.
pub const FEATURE_COUNT: usize = LANDMARK_COUNT * 2;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    /// The image channel layout cannot be converted to RGB
    #[error("Unexpected image format: {0}")]
    Format(String),
    /// The hand-pose detector itself failed
    #[error("Hand detector error: {0}")]
    Detector(String),
    /// The detector returned a landmark set of the wrong size
    #[error("Feature extraction error: expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },
}

/// A single keypoint, normalized to [0, 1] relative to image width and height.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The ordered keypoints of one detected hand. A well-formed set has
/// [`LANDMARK_COUNT`] points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandLandmarks {
    points: Vec<Landmark>,
}

impl HandLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }

    /// Area in pixels of the axis-aligned box around all points, for an image of
    /// `width` x `height`.
    pub fn bounding_box_area(&self, width: u32, height: u32) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        let (mut min_x, mut max_x) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
        for p in &self.points {
            let (x, y) = (p.x * width as f32, p.y * height as f32);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        (max_x - min_x) * (max_y - min_y)
    }
}

/// Exactly [`FEATURE_COUNT`] coordinates of one hand in landmark order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector([f32; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl TryFrom<&HandLandmarks> for FeatureVector {
    type Error = ExtractionError;

    fn try_from(hand: &HandLandmarks) -> Result<Self, Self::Error> {
        let flat: Vec<f32> = hand.points().iter().flat_map(|p| [p.x, p.y]).collect();
        let features: [f32; FEATURE_COUNT] = flat.try_into().map_err(|flat: Vec<f32>| {
            ExtractionError::FeatureCount { expected: FEATURE_COUNT, actual: flat.len() }
        })?;
        Ok(Self(features))
    }
}

impl TryFrom<&[f32]> for FeatureVector {
    type Error = ExtractionError;

    fn try_from(values: &[f32]) -> Result<Self, Self::Error> {
        let features: [f32; FEATURE_COUNT] = values.try_into().map_err(|_| {
            ExtractionError::FeatureCount { expected: FEATURE_COUNT, actual: values.len() }
        })?;
        Ok(Self(features))
    }
}

/// Result of running extraction on one image. Finding no hand is a normal outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Features(FeatureVector),
    NoHand,
}

/// Converts grayscale, RGB, BGR, RGBA or BGRA buffers into an RGB image.
pub fn to_rgb(image: &DecodedImage) -> Result<RgbImage, ExtractionError> {
    let src = image.as_bytes();
    let swap = image.order() == ChannelOrder::Bgr;
    let rgb: Vec<u8> = match image.channels() {
        1 => src.iter().flat_map(|&v| [v, v, v]).collect(),
        3 if swap => src.chunks_exact(3).flat_map(|px| [px[2], px[1], px[0]]).collect(),
        3 => src.to_vec(),
        4 if swap => src.chunks_exact(4).flat_map(|px| [px[2], px[1], px[0]]).collect(),
        4 => src.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]).collect(),
        n => {
            error!("Unexpected image format: {} channels", n);
            return Err(ExtractionError::Format(format!(
                "({}, {}, {})",
                image.height(),
                image.width(),
                n
            )));
        }
    };
    RgbImage::from_raw(image.width(), image.height(), rgb)
        .ok_or_else(|| ExtractionError::Format("pixel buffer does not match image size".into()))
}

/// Picks the hand with the largest bounding box, keeping the first on ties.
pub fn select_hand(hands: &[HandLandmarks], width: u32, height: u32) -> Option<&HandLandmarks> {
    let (first, rest) = hands.split_first()?;
    if rest.is_empty() {
        info!("Single hand detected");
        return Some(first);
    }

    info!("Multiple hands detected ({}), selecting largest", hands.len());
    let mut selected = first;
    let mut largest_area = first.bounding_box_area(width, height);
    for hand in rest {
        let area = hand.bounding_box_area(width, height);
        if area > largest_area {
            largest_area = area;
            selected = hand;
        }
    }
    info!("Selected hand with bounding box area: {:.2} pixels", largest_area);
    Some(selected)
}

/// Runs a [`HandDetector`] on decoded images and turns the chosen hand into features.
#[derive(Clone)]
pub struct LandmarkExtractor {
    detector: Arc<dyn HandDetector>,
    options: DetectionOptions,
}

impl LandmarkExtractor {
    pub fn new(detector: Arc<dyn HandDetector>) -> Self {
        Self::with_options(detector, DetectionOptions::default())
    }

    pub fn with_options(detector: Arc<dyn HandDetector>, options: DetectionOptions) -> Self {
        Self { detector, options }
    }

    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    pub fn extract(&self, image: &DecodedImage) -> Result<Extraction, ExtractionError> {
        info!(
            "Input image shape: ({}, {}, {})",
            image.height(),
            image.width(),
            image.channels()
        );
        let rgb = to_rgb(image)?;

        let mut hands = self.detector.detect(&rgb, &self.options)?;
        hands.truncate(self.options.max_num_hands);

        let Some(hand) = select_hand(&hands, rgb.width(), rgb.height()) else {
            warn!("No hand landmarks detected in the image");
            return Ok(Extraction::NoHand);
        };

        let features = FeatureVector::try_from(hand).inspect_err(|e| error!("{}", e))?;
        info!("Extracted {} features from hand landmarks", FEATURE_COUNT);
        Ok(Extraction::Features(features))
    }
}
