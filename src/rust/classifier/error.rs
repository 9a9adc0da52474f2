use std::path::PathBuf;

/// Represents the different types of errors that can occur while loading or
/// querying the sign classifier.
///
/// The type is `Clone` so that one failed load attempt can be reported to every
/// caller that was waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    /// Required configuration (the model artifact path) is missing
    #[error("{0}")]
    ConfigError(String),
    /// The configured model path does not point to an existing file
    #[error("Model file not found at {}", .0.display())]
    NotFoundError(PathBuf),
    /// The artifact could not be read, parsed, verified or turned into a usable model
    #[error("Failed to load model: {0}")]
    LoadError(String),
    /// The feature vector handed to the classifier has the wrong shape
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// The loaded model failed while producing a prediction
    #[error("Prediction error: {0}")]
    PredictionError(String),
}

impl From<ort::Error> for ClassifierError {
    fn from(err: ort::Error) -> Self {
        ClassifierError::LoadError(err.to_string())
    }
}
