use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;
use signlens::config::Args;
use signlens::server::{router, AppState};
use signlens::{LandmarkExtractor, ModelStore, OnnxHandDetector, SignPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    signlens::init_logger();
    let args = Args::parse();

    info!("=== Starting ASL Sign Language Recognition service ===");
    let runtime = args.runtime_config();

    let detector = OnnxHandDetector::from_file(&args.hand_model_path, &runtime)
        .with_context(|| format!("Failed to load hand model from {:?}", args.hand_model_path))?;
    let extractor = LandmarkExtractor::new(Arc::new(detector));

    // The classification model itself is loaded on the first request
    let models = Arc::new(ModelStore::with_loader(
        args.artifact_source(),
        Arc::new(signlens::classifier::BundleLoader { runtime }),
    ));
    let state = AppState::new(SignPipeline::new(extractor, models));
    let app = router(state, &args.client_url).context("Invalid CLIENT_URL")?;

    let address = args.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Starting server on {}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
