//! HTTP surface of the service.

mod handlers;
mod response;

pub use response::{ApiReply, ApiResponse};

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::InvalidHeaderValue;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use log::info;
use tower_http::cors::{Any, CorsLayer};

use crate::classifier::ModelStore;
use crate::pipeline::SignPipeline;

/// Largest request body the router reads. Larger than the image limit so that
/// oversized images are rejected with a proper message.
pub const BODY_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: SignPipeline,
    pub models: Arc<ModelStore>,
}

impl AppState {
    pub fn new(pipeline: SignPipeline) -> Self {
        let models = Arc::clone(pipeline.models());
        Self { pipeline, models }
    }
}

/// Builds the router with CORS restricted to `client_url`.
pub fn router(state: AppState, client_url: &str) -> Result<Router, InvalidHeaderValue> {
    info!("CORS enabled for: {}", client_url);
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(client_url)?)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/translate", post(handlers::translate))
        .route("/api/translate/realtime", post(handlers::translate_realtime))
        .route("/api/model/info", get(handlers::model_info))
        .route("/api/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .with_state(state))
}
