//! ASL fingerspelling recognition from still images.
//!
//! An image is decoded, the most prominent hand is located and reduced to 42
//! landmark coordinates, and a trained classifier maps those to one of 28 signs
//! (the letters A-Z, "Space" and "nothing").
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use signlens::{
//!     decode_image, ArtifactSource, LandmarkExtractor, ModelStore, OnnxHandDetector, Outcome,
//!     RuntimeConfig, SignPipeline,
//! };
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! let runtime = RuntimeConfig::default();
//! let detector = OnnxHandDetector::from_file(Path::new("models/hand_landmark.onnx"), &runtime)?;
//! let models = ModelStore::new(ArtifactSource::Configured {
//!     path: Some(PathBuf::from("models/asl_model.json")),
//!     sha256: None,
//! });
//! let pipeline = SignPipeline::new(LandmarkExtractor::new(Arc::new(detector)), Arc::new(models));
//!
//! let image = decode_image(&std::fs::read("frame.png")?)?;
//! match pipeline.run(&image) {
//!     Outcome::Success { label, confidence } => println!("{} ({:.2})", label, confidence),
//!     Outcome::NoHand { message } => println!("{}", message),
//!     Outcome::Error { message, .. } => eprintln!("{}", message),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The model is loaded at most once per [`ModelStore`], on first use, no matter how
//! many threads ask for it concurrently. [`SignPipeline`] is cheap to clone and can be
//! shared across threads.

pub mod classifier;
pub mod config;
pub mod decoder;
pub mod landmarks;
pub mod pipeline;
mod runtime;
pub mod server;

pub use classifier::{
    global_store, predict_sign, ArtifactSource, ClassifierError, LoadedModel, ModelInfo, ModelLoader,
    ModelStore, Prediction,
};
pub use decoder::{decode_data_uri, decode_image, decode_upload, DecodeError, DecodedImage};
pub use landmarks::{
    DetectionOptions, Extraction, ExtractionError, FeatureVector, HandDetector, HandLandmarks,
    Landmark, LandmarkExtractor, OnnxHandDetector, FEATURE_COUNT,
};
pub use pipeline::{Fault, Outcome, SignPipeline};
pub use runtime::{create_session_builder, RuntimeConfig};

/// Initializes `env_logger`, defaulting to the `info` level when `RUST_LOG` is unset.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
