use std::collections::HashMap;
use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use log::{debug, info};
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use super::{DetectionOptions, ExtractionError, HandDetector, HandLandmarks, Landmark};
use crate::runtime::{open_session, RuntimeConfig};

/// Square input edge of the MediaPipe hand-landmark network.
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Hand detector backed by a single-hand landmark ONNX model.
///
/// The model is expected to:
/// - Accept one NHWC float input of shape [1, size, size, 3] with values in [0, 1]
/// - Output landmarks of shape [1, 63] (x, y, z per keypoint, in input pixels) first
/// - Output a hand presence score of shape [1, 1] second
///
/// The whole frame is fed to the network, so at most one hand is reported per call.
#[derive(Debug)]
pub struct OnnxHandDetector {
    session: Session,
    input_name: String,
    input_size: u32,
}

impl OnnxHandDetector {
    pub fn from_file(path: &Path, config: &RuntimeConfig) -> Result<Self, ExtractionError> {
        if !path.is_file() {
            return Err(ExtractionError::Detector(format!(
                "Hand landmark model not found at {:?}",
                path
            )));
        }

        let session = open_session(path, config).map_err(|e| {
            ExtractionError::Detector(format!("Failed to load hand landmark model: {}", e))
        })?;
        Self::validate_model(&session)?;

        let input_name = session.inputs[0].name.clone();
        info!("Hand landmark model loaded from {:?} (input '{}')", path, input_name);
        Ok(Self { session, input_name, input_size: DEFAULT_INPUT_SIZE })
    }

    /// Overrides the network input edge for models exported at another resolution.
    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    fn validate_model(session: &Session) -> Result<(), ExtractionError> {
        if session.inputs.is_empty() {
            return Err(ExtractionError::Detector("Hand landmark model has no inputs".into()));
        }
        if session.outputs.len() < 2 {
            return Err(ExtractionError::Detector(format!(
                "Hand landmark model must have landmark and presence outputs, found {}",
                session.outputs.len()
            )));
        }
        Ok(())
    }

    fn input_tensor(&self, image: &RgbImage) -> Array4<f32> {
        let size = self.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
        Array4::from_shape_fn((1, size as usize, size as usize, 3), |(_, y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        })
    }
}

impl HandDetector for OnnxHandDetector {
    fn detect(
        &self,
        image: &RgbImage,
        options: &DetectionOptions,
    ) -> Result<Vec<HandLandmarks>, ExtractionError> {
        let detector_error = |what: &str, e: ort::Error| {
            ExtractionError::Detector(format!("Failed to {}: {}", what, e))
        };

        let tensor = Tensor::from_array(self.input_tensor(image))
            .map_err(|e| detector_error("create input tensor", e))?;
        let mut inputs = HashMap::new();
        inputs.insert(self.input_name.as_str(), tensor);

        let outputs = self.session.run(inputs).map_err(|e| detector_error("run hand model", e))?;
        let coords = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| detector_error("extract landmark tensor", e))?;
        let presence = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| detector_error("extract presence tensor", e))?;

        let score = presence.iter().next().copied().unwrap_or(0.0);
        debug!("Hand presence score: {:.4}", score);
        if score < options.min_detection_confidence {
            return Ok(Vec::new());
        }

        let size = self.input_size as f32;
        let values: Vec<f32> = coords.iter().copied().collect();
        let points = values
            .chunks_exact(3)
            .map(|xyz| Landmark::new(xyz[0] / size, xyz[1] / size))
            .collect();
        Ok(vec![HandLandmarks::new(points)])
    }
}
