#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::RgbImage;
use ndarray::{Array1, ArrayView2};
use serde_json::{json, Map, Value};
use signlens::classifier::{Capability, SignModel, CLASSES};
use signlens::{
    ArtifactSource, ClassifierError, DetectionOptions, ExtractionError, HandDetector, HandLandmarks,
    Landmark, LandmarkExtractor, LoadedModel, ModelLoader, ModelStore, SignPipeline, FEATURE_COUNT,
};
use tempfile::NamedTempFile;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Always reports the same hands
pub struct StubDetector {
    pub hands: Vec<HandLandmarks>,
}

impl HandDetector for StubDetector {
    fn detect(&self, _image: &RgbImage, _options: &DetectionOptions) -> Result<Vec<HandLandmarks>, ExtractionError> {
        Ok(self.hands.clone())
    }
}

pub struct FailingDetector;

impl HandDetector for FailingDetector {
    fn detect(&self, _image: &RgbImage, _options: &DetectionOptions) -> Result<Vec<HandLandmarks>, ExtractionError> {
        Err(ExtractionError::Detector("graph execution failed".into()))
    }
}

/// A 21-point hand spread over the normalized box (x0, y0)-(x1, y1)
pub fn hand(x0: f32, y0: f32, x1: f32, y1: f32) -> HandLandmarks {
    let points = (0..21)
        .map(|i| {
            let t = i as f32 / 20.0;
            Landmark::new(x0 + (x1 - x0) * t, y0 + (y1 - y0) * t)
        })
        .collect();
    HandLandmarks::new(points)
}

/// Answers every row with the same probabilities
pub struct FixedModel {
    pub probabilities: Vec<f32>,
}

impl FixedModel {
    /// `confidence` on `index`, the rest spread over the next class
    pub fn peaked(index: usize, confidence: f32) -> Self {
        let mut probabilities = vec![0.0; CLASSES.len()];
        probabilities[index] = confidence;
        probabilities[(index + 1) % CLASSES.len()] = 1.0 - confidence;
        Self { probabilities }
    }
}

impl SignModel for FixedModel {
    fn model_type(&self) -> &str {
        "FixedModel"
    }

    fn capability(&self) -> Capability {
        Capability::Probabilities
    }

    fn predict_probabilities(&self, row: ArrayView2<'_, f32>) -> Result<Array1<f32>, ClassifierError> {
        assert_eq!(row.shape(), &[1, FEATURE_COUNT]);
        Ok(Array1::from_vec(self.probabilities.clone()))
    }
}

/// Counts loads; the first `failures` fail, every load takes `delay`
pub struct CountingLoader {
    pub probabilities: Vec<f32>,
    pub failures: usize,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl CountingLoader {
    pub fn new(model: FixedModel) -> Arc<Self> {
        Self::with(model, 0, Duration::ZERO)
    }

    pub fn with(model: FixedModel, failures: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            probabilities: model.probabilities,
            failures,
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self, _path: &Path, _expected_sha256: Option<&str>) -> Result<LoadedModel, ClassifierError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        if call < self.failures {
            return Err(ClassifierError::LoadError(format!("corrupt artifact (attempt {})", call + 1)));
        }
        let model = FixedModel { probabilities: self.probabilities.clone() };
        LoadedModel::new(Arc::new(model), None, Map::new())
    }
}

/// A store whose artifact path exists; keep the returned file alive.
pub fn store_with(loader: Arc<dyn ModelLoader>) -> (ModelStore, NamedTempFile) {
    let file = NamedTempFile::new().unwrap();
    let source = ArtifactSource::Configured { path: Some(file.path().to_path_buf()), sha256: None };
    (ModelStore::with_loader(source, loader), file)
}

pub fn unconfigured_store() -> ModelStore {
    ModelStore::new(ArtifactSource::Configured { path: None, sha256: None })
}

pub fn pipeline(detector: Arc<dyn HandDetector>, models: Arc<ModelStore>) -> SignPipeline {
    SignPipeline::new(LandmarkExtractor::new(detector), models)
}

/// Writes a logistic-regression bundle whose class `index` always wins.
pub fn write_logistic_bundle(index: usize) -> NamedTempFile {
    let mut intercept = vec![0.0; CLASSES.len()];
    intercept[index] = 10.0;
    let bundle = json!({
        "model": {
            "type": "logistic_regression",
            "coef": vec![vec![0.0; FEATURE_COUNT]; CLASSES.len()],
            "intercept": intercept,
        },
        "metadata": { "dataset": "synthetic" },
    });
    write_json(&bundle)
}

pub fn write_json(value: &Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(value.to_string().as_bytes()).unwrap();
    file
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([180, 140, 110]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn data_uri(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64.encode(bytes))
}
