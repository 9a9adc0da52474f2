use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use log::{error, info};

use super::bundle::{load_bundle, LoadedModel};
use super::error::ClassifierError;
use super::labels::Prediction;
use super::{Classification, ModelInfo};
use crate::landmarks::FEATURE_COUNT;
use crate::runtime::RuntimeConfig;

pub const MODEL_PATH_VAR: &str = "MODEL_PATH";
pub const MODEL_SHA256_VAR: &str = "MODEL_SHA256";

/// Where the store finds the model artifact on each load attempt.
#[derive(Debug, Clone)]
pub enum ArtifactSource {
    /// Fixed at construction, typically from command-line configuration
    Configured {
        path: Option<PathBuf>,
        sha256: Option<String>,
    },
    /// Read from `MODEL_PATH` / `MODEL_SHA256` every time a load is attempted
    Environment,
}

impl ArtifactSource {
    fn resolve(&self) -> Result<(PathBuf, Option<String>), ClassifierError> {
        let (path, sha256) = match self {
            Self::Configured { path, sha256 } => (path.clone(), sha256.clone()),
            Self::Environment => (
                env::var_os(MODEL_PATH_VAR).filter(|p| !p.is_empty()).map(PathBuf::from),
                env::var(MODEL_SHA256_VAR).ok().filter(|s| !s.is_empty()),
            ),
        };
        let path = path.ok_or_else(|| {
            ClassifierError::ConfigError(format!("{} environment variable is not set", MODEL_PATH_VAR))
        })?;

        let resolved = fs::canonicalize(&path).unwrap_or(path);
        if !resolved.is_file() {
            return Err(ClassifierError::NotFoundError(resolved));
        }
        Ok((resolved, sha256))
    }
}

/// Turns a resolved artifact path into a ready model.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path, expected_sha256: Option<&str>) -> Result<LoadedModel, ClassifierError>;
}

/// Loads JSON model bundles (see [`load_bundle`]).
#[derive(Debug, Clone, Default)]
pub struct BundleLoader {
    pub runtime: RuntimeConfig,
}

impl ModelLoader for BundleLoader {
    fn load(&self, path: &Path, expected_sha256: Option<&str>) -> Result<LoadedModel, ClassifierError> {
        load_bundle(path, expected_sha256, &self.runtime)
    }
}

#[derive(Default)]
struct Attempts {
    started: u64,
    last_error: Option<ClassifierError>,
}

/// Owns the process's classification model and loads it on first use.
///
/// - At most one successful load happens per store; callers never see a
///   half-built model.
/// - Concurrent first callers wait for the one in-flight attempt. If it fails they
///   all receive its error.
/// - Failures are not remembered: the next call after a failed attempt tries again.
pub struct ModelStore {
    source: ArtifactSource,
    loader: Arc<dyn ModelLoader>,
    loaded: OnceLock<Arc<LoadedModel>>,
    attempts: Mutex<Attempts>,
    finished: AtomicU64,
}

impl ModelStore {
    pub fn new(source: ArtifactSource) -> Self {
        Self::with_loader(source, Arc::new(BundleLoader::default()))
    }

    pub fn with_loader(source: ArtifactSource, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            source,
            loader,
            loaded: OnceLock::new(),
            attempts: Mutex::new(Attempts::default()),
            finished: AtomicU64::new(0),
        }
    }

    /// A store that reads its artifact location from the environment.
    pub fn from_env() -> Self {
        Self::new(ArtifactSource::Environment)
    }

    /// Returns the loaded model, loading it first if needed.
    pub fn get(&self) -> Result<Arc<LoadedModel>, ClassifierError> {
        if let Some(model) = self.loaded.get() {
            return Ok(Arc::clone(model));
        }

        let seen = self.finished.load(Ordering::Acquire);
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);

        // Loaded by the attempt we were waiting on
        if let Some(model) = self.loaded.get() {
            return Ok(Arc::clone(model));
        }
        // Failed by the attempt we were waiting on
        if attempts.started > seen {
            if let Some(err) = &attempts.last_error {
                return Err(err.clone());
            }
        }

        attempts.started += 1;
        info!("Loading classification model (attempt {})", attempts.started);
        let result = self.load_once();
        self.finished.store(attempts.started, Ordering::Release);

        match result {
            Ok(model) => {
                attempts.last_error = None;
                Ok(Arc::clone(self.loaded.get_or_init(|| model)))
            }
            Err(err) => {
                error!("Failed to load model: {}", err);
                attempts.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn load_once(&self) -> Result<Arc<LoadedModel>, ClassifierError> {
        let (path, sha256) = self.source.resolve()?;
        let model = self.loader.load(&path, sha256.as_deref())?;
        Ok(Arc::new(model))
    }

    /// Whether a model has been loaded successfully.
    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// Number of load attempts made so far, successful or not.
    pub fn load_attempts(&self) -> u64 {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner).started
    }

    /// Classifies one feature vector.
    ///
    /// Fails with `ValidationError` for any length other than [`FEATURE_COUNT`]
    /// before the model is loaded or queried.
    pub fn classify(&self, features: &[f32]) -> Result<Classification, ClassifierError> {
        validate_features(features)?;
        self.get()?.classify(features)
    }

    /// Classifies one feature vector and applies the confidence gate.
    pub fn predict(&self, features: &[f32]) -> Result<Prediction, ClassifierError> {
        validate_features(features)?;
        self.get()?.predict(features)
    }

    /// Describes the loaded model, loading it first if needed.
    pub fn info(&self) -> Result<ModelInfo, ClassifierError> {
        Ok(self.get()?.info().clone())
    }
}

fn validate_features(features: &[f32]) -> Result<(), ClassifierError> {
    if features.len() != FEATURE_COUNT {
        return Err(ClassifierError::ValidationError(format!(
            "Expected {} features, got {}",
            FEATURE_COUNT,
            features.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::model::{Capability, SignModel};
    use ndarray::{Array1, ArrayView2};
    use serde_json::Map;
    use std::sync::atomic::AtomicUsize;

    struct Constant;

    impl SignModel for Constant {
        fn model_type(&self) -> &str {
            "Constant"
        }
        fn capability(&self) -> Capability {
            Capability::Probabilities
        }
        fn predict_probabilities(&self, _row: ArrayView2<'_, f32>) -> Result<Array1<f32>, ClassifierError> {
            Ok(Array1::from_vec(vec![0.1, 0.9]))
        }
    }

    /// Fails the first `failures` loads, then succeeds
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl ModelLoader for Flaky {
        fn load(&self, _path: &Path, _sha256: Option<&str>) -> Result<LoadedModel, ClassifierError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ClassifierError::LoadError("corrupt".into()));
            }
            LoadedModel::new(Arc::new(Constant), None, Map::new())
        }
    }

    fn existing_file() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn test_unset_path_is_config_error() {
        let store = ModelStore::new(ArtifactSource::Configured { path: None, sha256: None });
        assert!(matches!(store.get(), Err(ClassifierError::ConfigError(_))));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let store = ModelStore::new(ArtifactSource::Configured {
            path: Some(PathBuf::from("/nonexistent/asl_model.json")),
            sha256: None,
        });
        assert!(matches!(store.get(), Err(ClassifierError::NotFoundError(_))));
    }

    #[test]
    fn test_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(ArtifactSource::Configured {
            path: Some(dir.path().to_path_buf()),
            sha256: None,
        });
        assert!(matches!(store.get(), Err(ClassifierError::NotFoundError(_))));
    }

    #[test]
    fn test_failed_load_is_retried() {
        let file = existing_file();
        let loader = Arc::new(Flaky { failures: 1, calls: AtomicUsize::new(0) });
        let store = ModelStore::with_loader(
            ArtifactSource::Configured { path: Some(file.path().to_path_buf()), sha256: None },
            loader.clone(),
        );

        assert!(matches!(store.get(), Err(ClassifierError::LoadError(_))));
        assert!(!store.is_loaded());
        assert!(store.get().is_ok());
        assert!(store.get().is_ok());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.load_attempts(), 2);
    }

    #[test]
    fn test_wrong_length_never_loads() {
        let store = ModelStore::new(ArtifactSource::Configured { path: None, sha256: None });
        for len in [0, 41, 43, 63] {
            let features = vec![0.5; len];
            assert!(matches!(store.classify(&features), Err(ClassifierError::ValidationError(_))));
        }
        assert_eq!(store.load_attempts(), 0);
    }
}
