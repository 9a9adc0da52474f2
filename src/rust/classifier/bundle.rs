use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use ndarray::ArrayView2;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::error::ClassifierError;
use super::forest::{ForestSpec, RandomForest};
use super::labels::{gate, Prediction, CLASSES, CONFIDENCE_THRESHOLD};
use super::linear::{LogisticRegression, LogisticSpec};
use super::model::{probe_capability, SignModel};
use super::onnx::{OnnxClassifier, OnnxSpec};
use super::{Classification, ModelInfo};
use crate::landmarks::FEATURE_COUNT;
use crate::runtime::RuntimeConfig;

/// The object stored under the bundle's `model` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    RandomForest(ForestSpec),
    LogisticRegression(LogisticSpec),
    Onnx(OnnxSpec),
}

/// A model ready to answer, together with what the info endpoint reports about it.
pub struct LoadedModel {
    model: Arc<dyn SignModel>,
    info: ModelInfo,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel").field("info", &self.info).finish()
    }
}

impl LoadedModel {
    /// Wraps a model after checking that it can produce predictions for a
    /// [`FEATURE_COUNT`]-wide row.
    pub fn new(
        model: Arc<dyn SignModel>,
        artifact_sha256: Option<String>,
        metadata: Map<String, Value>,
    ) -> Result<Self, ClassifierError> {
        probe_capability(model.as_ref(), FEATURE_COUNT)?;
        let info = ModelInfo {
            model_type: model.model_type().to_string(),
            num_classes: CLASSES.len(),
            classes: CLASSES.iter().map(|c| c.to_string()).collect(),
            confidence_threshold: CONFIDENCE_THRESHOLD,
            expected_features: FEATURE_COUNT,
            capability: model.capability(),
            artifact_sha256,
            details: model.details(),
            metadata,
        };
        Ok(Self { model, info })
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    /// Runs the model on one feature row and picks the most probable class.
    pub fn classify(&self, features: &[f32]) -> Result<Classification, ClassifierError> {
        let row = ArrayView2::from_shape((1, features.len()), features)
            .map_err(|e| ClassifierError::ValidationError(format!("Failed to shape features: {}", e)))?;

        let probabilities = self.model.predict_probabilities(row)?.to_vec();
        let (index, confidence) = argmax(&probabilities)
            .ok_or_else(|| ClassifierError::PredictionError("Model returned no probabilities".into()))?;
        info!("Raw prediction - Class index: {}, Confidence: {:.4}", index, confidence);

        Ok(Classification { probabilities, index, confidence })
    }

    pub fn predict(&self, features: &[f32]) -> Result<Prediction, ClassifierError> {
        let classification = self.classify(features)?;
        log_top_classes(&classification.probabilities);
        let prediction = gate(classification.index, classification.confidence);
        info!("Final Prediction: {}, Confidence: {:.4}", prediction.label, prediction.confidence);
        Ok(prediction)
    }
}

/// Index and value of the largest entry; the first one wins on ties.
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values.iter().copied().enumerate().fold(None, |best, (i, v)| match best {
        Some((_, top)) if v <= top => best,
        _ => Some((i, v)),
    })
}

fn log_top_classes(probabilities: &[f32]) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    log::debug!("Top 3 predictions:");
    for (index, probability) in ranked.into_iter().take(3) {
        log::debug!("  {}: {:.4}", super::labels::label_for_index(index), probability);
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Reads, verifies and instantiates the JSON model bundle at `path`.
///
/// The bundle is an object with a required `model` entry (see [`ModelSpec`]) and an
/// optional free-form `metadata` object. ONNX model paths are resolved relative to
/// the bundle's directory.
pub fn load_bundle(
    path: &Path,
    expected_sha256: Option<&str>,
    runtime: &RuntimeConfig,
) -> Result<LoadedModel, ClassifierError> {
    info!("Loading model from: {}", path.display());
    let bytes = fs::read(path)
        .map_err(|e| ClassifierError::LoadError(format!("Failed to read model file: {}", e)))?;

    let digest = sha256_hex(&bytes);
    if let Some(expected) = expected_sha256 {
        if !digest.eq_ignore_ascii_case(expected.trim()) {
            error!("Model checksum mismatch: expected {}, got {}", expected, digest);
            return Err(ClassifierError::LoadError(format!(
                "Model checksum mismatch: expected {}, got {}",
                expected, digest
            )));
        }
    }

    let bundle: Value = serde_json::from_slice(&bytes)
        .map_err(|e| ClassifierError::LoadError(format!("Model artifact is not a valid bundle: {}", e)))?;
    let bundle = bundle.as_object().ok_or_else(|| {
        ClassifierError::LoadError("Model artifact is not a valid bundle: expected a JSON object".into())
    })?;
    let model_value = bundle
        .get("model")
        .ok_or_else(|| ClassifierError::LoadError("Model dictionary does not contain 'model' key".into()))?;
    let spec: ModelSpec = serde_json::from_value(model_value.clone()).map_err(|e| {
        ClassifierError::LoadError(format!("Loaded object is not a valid classifier: {}", e))
    })?;
    let metadata = bundle
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let model: Arc<dyn SignModel> = match &spec {
        ModelSpec::RandomForest(forest) => Arc::new(RandomForest::from_spec(forest)?),
        ModelSpec::LogisticRegression(linear) => Arc::new(LogisticRegression::from_spec(linear)?),
        ModelSpec::Onnx(onnx) => Arc::new(OnnxClassifier::from_spec(onnx, base_dir, CLASSES.len(), runtime)?),
    };

    let loaded = LoadedModel::new(model, Some(digest), metadata)?;
    info!("Model loaded and cached successfully");
    info!("Model type: {}", loaded.info().model_type);
    for (key, value) in &loaded.info().details {
        info!("  {}: {}", key, value);
    }
    Ok(loaded)
}
