use std::fmt;
use std::sync::Arc;

use log::{error, info};

use crate::classifier::{ClassifierError, ModelStore};
use crate::decoder::DecodedImage;
use crate::landmarks::{Extraction, ExtractionError, LandmarkExtractor};

pub const NO_HAND_MESSAGE: &str = "No hand detected in the frame. Please show your hand clearly.";

/// Which side is at fault when a run fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The image itself could not be processed
    Client,
    Server,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success { label: String, confidence: f32 },
    NoHand { message: String },
    Error { message: String, fault: Fault },
}

#[derive(Debug)]
enum Stage {
    Extraction(ExtractionError),
    Classification(ClassifierError),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extraction(e) => write!(f, "{}", e),
            Stage::Classification(e) => write!(f, "{}", e),
        }
    }
}

impl Stage {
    fn fault(&self) -> Fault {
        match self {
            Stage::Extraction(ExtractionError::Format(_)) => Fault::Client,
            _ => Fault::Server,
        }
    }
}

/// Image in, sign out: landmark extraction followed by classification.
///
/// A run never retries a stage and never returns partial results. Every failure is
/// folded into [`Outcome::Error`].
#[derive(Clone)]
pub struct SignPipeline {
    extractor: LandmarkExtractor,
    models: Arc<ModelStore>,
}

impl SignPipeline {
    pub fn new(extractor: LandmarkExtractor, models: Arc<ModelStore>) -> Self {
        Self { extractor, models }
    }

    pub fn models(&self) -> &Arc<ModelStore> {
        &self.models
    }

    pub fn run(&self, image: &DecodedImage) -> Outcome {
        info!("Processing image for sign language prediction");
        match self.try_run(image) {
            Ok(Some((label, confidence))) => {
                info!("Prediction successful: {} ({:.4})", label, confidence);
                Outcome::Success { label, confidence }
            }
            Ok(None) => {
                info!("No hand detected");
                Outcome::NoHand { message: NO_HAND_MESSAGE.to_string() }
            }
            Err(stage) => {
                error!("Error processing image: {}", stage);
                Outcome::Error {
                    message: format!("Processing failed: {}", stage),
                    fault: stage.fault(),
                }
            }
        }
    }

    fn try_run(&self, image: &DecodedImage) -> Result<Option<(String, f32)>, Stage> {
        let features = match self.extractor.extract(image).map_err(Stage::Extraction)? {
            Extraction::Features(features) => features,
            Extraction::NoHand => return Ok(None),
        };
        let prediction = self
            .models
            .predict(features.as_slice())
            .map_err(Stage::Classification)?;
        Ok(Some((prediction.label, prediction.confidence)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ArtifactSource;
    use crate::decoder::ChannelOrder;
    use crate::landmarks::{DetectionOptions, HandDetector, HandLandmarks};
    use image::RgbImage;

    struct NoHands;

    impl HandDetector for NoHands {
        fn detect(&self, _image: &RgbImage, _options: &DetectionOptions) -> Result<Vec<HandLandmarks>, ExtractionError> {
            Ok(Vec::new())
        }
    }

    fn pipeline() -> SignPipeline {
        let store = ModelStore::new(ArtifactSource::Configured { path: None, sha256: None });
        SignPipeline::new(LandmarkExtractor::new(Arc::new(NoHands)), Arc::new(store))
    }

    #[test]
    fn test_no_hand_skips_model() {
        let image = DecodedImage::from(RgbImage::new(8, 8));
        let outcome = pipeline().run(&image);
        assert_eq!(outcome, Outcome::NoHand { message: NO_HAND_MESSAGE.to_string() });
    }

    #[test]
    fn test_bad_channel_count_is_client_fault() {
        let image = DecodedImage::new(2, 2, 2, ChannelOrder::Rgb, vec![0; 8]).unwrap();
        match pipeline().run(&image) {
            Outcome::Error { message, fault } => {
                assert_eq!(fault, Fault::Client);
                assert!(message.starts_with("Processing failed: Unexpected image format"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
