use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::info;
use ndarray::{Array1, ArrayView2};
use ort::session::Session;
use ort::value::Tensor;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::error::ClassifierError;
use super::model::{one_hot, Capability, SignModel};
use crate::runtime::{open_session, RuntimeConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct OnnxSpec {
    /// Model file, relative to the bundle's directory unless absolute
    pub path: PathBuf,
    /// Class count used to size one-hot answers of label-only models
    #[serde(default)]
    pub num_classes: Option<usize>,
}

#[derive(Debug, Clone)]
enum OutputKind {
    Probabilities(String),
    Label(String),
}

/// A classifier exported to ONNX, e.g. with `skl2onnx` and `zipmap=False`.
///
/// The model must take one float input of shape [1, n_features]. A tensor output
/// whose name mentions "probabilit" is used for class probabilities; failing that,
/// an output whose name mentions "label" is used as a plain prediction.
#[derive(Debug)]
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
    output: OutputKind,
    num_classes: usize,
    path: PathBuf,
}

impl OnnxClassifier {
    pub fn from_spec(
        spec: &OnnxSpec,
        base_dir: &Path,
        default_classes: usize,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let path = base_dir.join(&spec.path);
        if !path.is_file() {
            return Err(ClassifierError::LoadError(format!(
                "ONNX model file not found at {}",
                path.display()
            )));
        }

        let session = open_session(&path, runtime)?;
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| ClassifierError::LoadError("ONNX classifier has no inputs".into()))?;
        let output = Self::find_output(&session)?;
        info!("ONNX classifier loaded from {:?} using output {:?}", path, output);

        Ok(Self {
            session,
            input_name,
            output,
            num_classes: spec.num_classes.unwrap_or(default_classes),
            path,
        })
    }

    fn find_output(session: &Session) -> Result<OutputKind, ClassifierError> {
        let names: Vec<&str> = session.outputs.iter().map(|o| o.name.as_str()).collect();
        let find = |needle: &str| {
            names
                .iter()
                .find(|name| name.to_ascii_lowercase().contains(needle))
                .map(|name| name.to_string())
        };

        if let Some(name) = find("probabilit") {
            return Ok(OutputKind::Probabilities(name));
        }
        if let Some(name) = find("label") {
            return Ok(OutputKind::Label(name));
        }
        Err(ClassifierError::LoadError(format!(
            "Loaded object is not a valid classifier: no probability or label output (outputs: {:?})",
            names
        )))
    }
}

impl SignModel for OnnxClassifier {
    fn model_type(&self) -> &str {
        "OnnxClassifier"
    }

    fn capability(&self) -> Capability {
        match self.output {
            OutputKind::Probabilities(_) => Capability::Probabilities,
            OutputKind::Label(_) => Capability::LabelsOnly,
        }
    }

    fn predict_probabilities(&self, row: ArrayView2<'_, f32>) -> Result<Array1<f32>, ClassifierError> {
        let prediction_error = |what: &str, e: ort::Error| {
            ClassifierError::PredictionError(format!("Failed to {}: {}", what, e))
        };

        let tensor = Tensor::from_array(row.to_owned())
            .map_err(|e| prediction_error("create input tensor", e))?;
        let mut inputs = HashMap::new();
        inputs.insert(self.input_name.as_str(), tensor);
        let outputs = self.session.run(inputs).map_err(|e| prediction_error("run model", e))?;

        match &self.output {
            OutputKind::Probabilities(name) => {
                let probabilities = outputs[name.as_str()]
                    .try_extract_tensor::<f32>()
                    .map_err(|e| prediction_error("extract probabilities", e))?;
                Ok(probabilities.iter().copied().collect())
            }
            OutputKind::Label(name) => {
                let labels = outputs[name.as_str()]
                    .try_extract_tensor::<i64>()
                    .map_err(|e| prediction_error("extract label", e))?;
                let label = labels
                    .iter()
                    .next()
                    .and_then(|&l| usize::try_from(l).ok())
                    .ok_or_else(|| ClassifierError::PredictionError("Model returned no valid label".into()))?;
                Ok(one_hot(label, self.num_classes))
            }
        }
    }

    fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("onnx_path".into(), json!(self.path.display().to_string()));
        details
    }
}
