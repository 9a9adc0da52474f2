use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::Result as OrtResult;
use std::path::Path;
use std::sync::Once;

static INIT: Once = Once::new();

/// Threading and graph settings applied to every ONNX session the service opens
/// (the hand-landmark detector and ONNX classifiers alike).
#[derive(Debug)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: GraphOptimizationLevel,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 0, // Let ONNX Runtime decide
            optimization_level: GraphOptimizationLevel::Level3,
        }
    }
}

impl Clone for RuntimeConfig {
    fn clone(&self) -> Self {
        Self {
            inter_threads: self.inter_threads,
            intra_threads: self.intra_threads,
            optimization_level: copy_level(&self.optimization_level),
        }
    }
}

// GraphOptimizationLevel is neither Copy nor Clone
fn copy_level(level: &GraphOptimizationLevel) -> GraphOptimizationLevel {
    match level {
        GraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        GraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        GraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        GraphOptimizationLevel::Disable => GraphOptimizationLevel::Disable,
    }
}

fn init_onnx_environment() -> OrtResult<()> {
    ort::init()
        .with_name("signlens")
        .commit()?;
    Ok(())
}

/// Commits the named process-wide environment once. If that fails, ONNX Runtime
/// falls back to its default environment on the first session, so the failure is
/// only logged.
pub fn ensure_initialized() {
    INIT.call_once(|| {
        if let Err(e) = init_onnx_environment() {
            log::warn!("Failed to initialize named ONNX Runtime environment: {}", e);
        }
    });
}

pub fn create_session_builder(config: &RuntimeConfig) -> OrtResult<SessionBuilder> {
    ensure_initialized();
    let mut builder = Session::builder()?;

    // Configure threading
    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }

    builder = builder.with_optimization_level(copy_level(&config.optimization_level))?;

    Ok(builder)
}

/// Opens a session for the model file at `path` using `config`.
pub fn open_session(path: &Path, config: &RuntimeConfig) -> OrtResult<Session> {
    log::info!("Opening ONNX session for {:?}", path);
    create_session_builder(config)?.commit_from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_initialization() {
        ensure_initialized();
        ensure_initialized(); // Second call should be a no-op
    }

    #[test]
    fn test_runtime_config_clone_keeps_settings() {
        let config = RuntimeConfig {
            inter_threads: 2,
            intra_threads: 4,
            optimization_level: GraphOptimizationLevel::Level1,
        };
        let cloned = config.clone();
        assert_eq!(cloned.inter_threads, 2);
        assert_eq!(cloned.intra_threads, 4);
        assert!(matches!(cloned.optimization_level, GraphOptimizationLevel::Level1));
    }

    #[test]
    fn test_open_session_missing_file() {
        let result = open_session(Path::new("/nonexistent/model.onnx"), &RuntimeConfig::default());
        assert!(result.is_err());
    }
}
