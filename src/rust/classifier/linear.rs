use ndarray::{Array1, Array2, ArrayView2};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::error::ClassifierError;
use super::model::{Capability, SignModel};

/// Multinomial logistic regression weights as exported from `coef_` / `intercept_`.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticSpec {
    /// `[n_classes][n_features]`
    pub coef: Vec<Vec<f32>>,
    /// `[n_classes]`
    pub intercept: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    coef: Array2<f32>,
    intercept: Array1<f32>,
}

impl LogisticRegression {
    pub fn from_spec(spec: &LogisticSpec) -> Result<Self, ClassifierError> {
        let n_classes = spec.coef.len();
        let n_features = spec.coef.first().map(Vec::len).unwrap_or(0);
        if n_classes == 0 || n_features == 0 {
            return Err(ClassifierError::LoadError("Logistic regression has no weights".into()));
        }
        if spec.coef.iter().any(|row| row.len() != n_features) {
            return Err(ClassifierError::LoadError("Logistic regression weight rows differ in length".into()));
        }
        if spec.intercept.len() != n_classes {
            return Err(ClassifierError::LoadError(format!(
                "Logistic regression has {} intercepts for {} classes",
                spec.intercept.len(),
                n_classes
            )));
        }

        let flat: Vec<f32> = spec.coef.iter().flatten().copied().collect();
        let coef = Array2::from_shape_vec((n_classes, n_features), flat)
            .map_err(|e| ClassifierError::LoadError(format!("Failed to shape weights: {}", e)))?;
        Ok(Self { coef, intercept: Array1::from_vec(spec.intercept.clone()) })
    }
}

fn softmax(scores: Array1<f32>) -> Array1<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp = scores.mapv(|s| (s - max).exp());
    let total = exp.sum();
    exp / total
}

impl SignModel for LogisticRegression {
    fn model_type(&self) -> &str {
        "LogisticRegression"
    }

    fn capability(&self) -> Capability {
        Capability::Probabilities
    }

    fn predict_probabilities(&self, row: ArrayView2<'_, f32>) -> Result<Array1<f32>, ClassifierError> {
        if row.nrows() != 1 || row.ncols() != self.coef.ncols() {
            return Err(ClassifierError::PredictionError(format!(
                "Logistic regression expects a [1, {}] row, got {:?}",
                self.coef.ncols(),
                row.shape()
            )));
        }
        let scores = self.coef.dot(&row.row(0)) + &self.intercept;
        Ok(softmax(scores))
    }

    fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("n_features_in".into(), json!(self.coef.ncols()));
        details
    }
}
