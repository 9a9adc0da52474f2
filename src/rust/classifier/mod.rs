//! Sign classification: the model bundle format, the built-in model families, and the
//! lazily loaded process-wide model store.

mod bundle;
mod error;
mod forest;
mod labels;
mod linear;
mod model;
mod onnx;
mod store;

pub use bundle::{load_bundle, LoadedModel, ModelSpec};
pub use error::ClassifierError;
pub use forest::{ForestSpec, RandomForest, TreeArrays};
pub use labels::{gate, label_for_index, Prediction, CLASSES, CONFIDENCE_THRESHOLD, UNCERTAIN};
pub use linear::{LogisticRegression, LogisticSpec};
pub use model::{Capability, SignModel};
pub use onnx::{OnnxClassifier, OnnxSpec};
pub use store::{ArtifactSource, BundleLoader, ModelLoader, ModelStore, MODEL_PATH_VAR, MODEL_SHA256_VAR};

use lazy_static::lazy_static;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Raw model answer for one feature vector, before the confidence gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub probabilities: Vec<f32>,
    pub index: usize,
    pub confidence: f32,
}

/// What the model info endpoint reports.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub num_classes: usize,
    pub classes: Vec<String>,
    pub confidence_threshold: f32,
    pub expected_features: usize,
    pub capability: Capability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_sha256: Option<String>,
    /// Family specific attributes such as `n_estimators`
    #[serde(flatten)]
    pub details: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

lazy_static! {
    static ref GLOBAL_STORE: Arc<ModelStore> = Arc::new(ModelStore::from_env());
}

/// The process-wide store, configured from `MODEL_PATH` and `MODEL_SHA256`.
pub fn global_store() -> Arc<ModelStore> {
    Arc::clone(&GLOBAL_STORE)
}

/// Classifies `features` with the process-wide model.
pub fn predict_sign(features: &[f32]) -> Result<Prediction, ClassifierError> {
    GLOBAL_STORE.predict(features)
}
