use ndarray::{Array1, Array2, ArrayView2};
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::ClassifierError;

/// What a loaded model is able to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The model yields a probability for every class
    Probabilities,
    /// The model only yields the winning class index
    LabelsOnly,
}

/// A trained classifier over fixed-length feature rows.
///
/// Any implementation that can turn a `[1, n_features]` row into per-class
/// probabilities can back the service. Models with [`Capability::LabelsOnly`]
/// answer with a one-hot vector.
pub trait SignModel: Send + Sync {
    /// Short type name reported by the model info endpoint
    fn model_type(&self) -> &str;

    fn capability(&self) -> Capability;

    /// Returns one probability per class for the single row in `row`.
    fn predict_probabilities(&self, row: ArrayView2<'_, f32>) -> Result<Array1<f32>, ClassifierError>;

    /// Optional model attributes (tree count, depth, ...) for the info endpoint.
    fn details(&self) -> Map<String, Value> {
        Map::new()
    }
}

/// One-hot vector for models that only report a class index.
pub(crate) fn one_hot(index: usize, num_classes: usize) -> Array1<f32> {
    let mut probabilities = Array1::zeros(num_classes.max(index + 1));
    probabilities[index] = 1.0;
    probabilities
}

/// Runs one prediction on an all-zero row to confirm the model can answer at all.
pub(crate) fn probe_capability(model: &dyn SignModel, n_features: usize) -> Result<(), ClassifierError> {
    let row = Array2::<f32>::zeros((1, n_features));
    let probabilities = model
        .predict_probabilities(row.view())
        .map_err(|e| ClassifierError::LoadError(format!("Loaded object is not a valid classifier: {}", e)))?;
    if probabilities.is_empty() {
        return Err(ClassifierError::LoadError(
            "Loaded object is not a valid classifier: prediction returned no classes".into(),
        ));
    }
    Ok(())
}
