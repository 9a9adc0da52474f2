use std::path::PathBuf;

use clap::Parser;

use crate::classifier::ArtifactSource;
use crate::runtime::RuntimeConfig;

/// ASL sign language recognition service
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Model bundle used for classification
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Expected SHA-256 of the model bundle (hex)
    #[arg(long, env = "MODEL_SHA256")]
    pub model_sha256: Option<String>,

    /// ONNX hand-landmark model
    #[arg(long, env = "HAND_MODEL_PATH")]
    pub hand_model_path: PathBuf,

    /// Origin allowed by CORS
    #[arg(long, env = "CLIENT_URL", default_value = "http://localhost:3000")]
    pub client_url: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "PORT", default_value_t = 5001)]
    pub port: u16,

    /// Threads per ONNX session (0 lets the runtime decide)
    #[arg(long, env = "ORT_INTRA_THREADS", default_value_t = 0)]
    pub intra_threads: usize,
}

impl Args {
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            intra_threads: self.intra_threads,
            ..RuntimeConfig::default()
        }
    }

    pub fn artifact_source(&self) -> ArtifactSource {
        ArtifactSource::Configured {
            path: self.model_path.clone(),
            sha256: self.model_sha256.clone(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["signlens_server", "--hand-model-path", "hand.onnx"]).unwrap();
        assert_eq!(args.hand_model_path, PathBuf::from("hand.onnx"));
        assert!(matches!(args.runtime_config().optimization_level, ort::session::builder::GraphOptimizationLevel::Level3));
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "signlens_server",
            "--hand-model-path",
            "hand.onnx",
            "--model-path",
            "bundle.json",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--intra-threads",
            "2",
        ])
        .unwrap();
        assert_eq!(args.bind_address(), "127.0.0.1:8080");
        assert_eq!(args.runtime_config().intra_threads, 2);
        assert!(matches!(
            args.artifact_source(),
            ArtifactSource::Configured { path: Some(p), .. } if p == PathBuf::from("bundle.json")
        ));
    }
}
