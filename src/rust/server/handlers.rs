use axum::body::{to_bytes, Bytes};
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use log::{error, info};
use serde::Deserialize;

use super::response::{ApiReply, ApiResponse};
use super::{AppState, BODY_LIMIT};
use crate::decoder::{self, DecodeError, DecodedImage};

const NO_IMAGE: &str = "No image data provided";

#[derive(Debug, Deserialize)]
struct ImagePayload {
    image: Option<String>,
}

/// `POST /api/translate`: a multipart `image` file, or JSON with a base64 data URI.
pub async fn translate(State(state): State<AppState>, request: Request) -> ApiReply {
    const CONTEXT: &str = "Translation failed";

    let image = if is_multipart(&request) {
        info!("Processing direct file upload");
        match read_upload(&state, request).await {
            Ok(Some((filename, bytes))) => {
                decode_blocking(CONTEXT, move || decoder::decode_upload(&filename, &bytes)).await
            }
            Ok(None) => return ApiReply::bad_request(NO_IMAGE),
            Err(reply) => return reply,
        }
    } else {
        info!("Checking for JSON base64 data");
        match read_data_uri(request).await {
            Some(uri) => decode_blocking(CONTEXT, move || decoder::decode_data_uri(&uri)).await,
            None => {
                error!("No image data received");
                return ApiReply::bad_request(NO_IMAGE);
            }
        }
    };

    match image {
        Ok(image) => run_pipeline(&state, image, CONTEXT).await,
        Err(reply) => reply,
    }
}

/// `POST /api/translate/realtime`: JSON with a base64 data URI, typically a webcam frame.
pub async fn translate_realtime(State(state): State<AppState>, request: Request) -> ApiReply {
    let Some(uri) = read_data_uri(request).await else {
        error!("No image data received in JSON payload");
        return ApiReply::bad_request(NO_IMAGE);
    };
    info!("Received real-time base64 image data with length: {}", uri.len());

    const CONTEXT: &str = "Real-time translation failed";
    match decode_blocking(CONTEXT, move || decoder::decode_data_uri(&uri)).await {
        Ok(image) => run_pipeline(&state, image, CONTEXT).await,
        Err(reply) => reply,
    }
}

/// `GET /api/model/info`
pub async fn model_info(State(state): State<AppState>) -> ApiReply {
    let models = state.models.clone();
    match tokio::task::spawn_blocking(move || models.info()).await {
        Ok(Ok(model_info)) => ApiReply(StatusCode::OK, ApiResponse::ModelInfo { model_info }),
        Ok(Err(err)) => {
            error!("Error getting model info: {}", err);
            ApiReply::internal(err.to_string())
        }
        Err(err) => ApiReply::internal(err.to_string()),
    }
}

/// `GET /api/health`
pub async fn health() -> ApiReply {
    ApiReply(
        StatusCode::OK,
        ApiResponse::Healthy {
            service: "ASL Sign Language Recognition",
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Returns the file name and bytes of the `image` field, or `None` when the form has
/// no such field.
async fn read_upload(state: &AppState, request: Request) -> Result<Option<(String, Bytes)>, ApiReply> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiReply::bad_request(e.body_text()))?;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiReply::bad_request(e.body_text()))?;
        let Some(field) = field else {
            return Ok(None);
        };
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            error!("No selected file in file upload part");
        }
        let bytes = field.bytes().await.map_err(|e| ApiReply::bad_request(e.body_text()))?;
        return Ok(Some((filename, bytes)));
    }
}

/// The `image` string of a JSON body. Anything else (not JSON, no `image` key,
/// a non-string value) counts as no image.
async fn read_data_uri(request: Request) -> Option<String> {
    let body = to_bytes(request.into_body(), BODY_LIMIT).await.ok()?;
    serde_json::from_slice::<ImagePayload>(&body).ok()?.image
}

/// Decodes on the blocking pool. Decode failures are the caller's (400); a crashed
/// task is ours (500).
async fn decode_blocking<F>(context: &str, decode: F) -> Result<DecodedImage, ApiReply>
where
    F: FnOnce() -> Result<DecodedImage, DecodeError> + Send + 'static,
{
    match tokio::task::spawn_blocking(decode).await {
        Ok(result) => result.map_err(ApiReply::from),
        Err(err) => {
            error!("Unhandled error: {}", err);
            Err(ApiReply::internal(format!("{}: {}", context, err)))
        }
    }
}

async fn run_pipeline(state: &AppState, image: DecodedImage, context: &str) -> ApiReply {
    let pipeline = state.pipeline.clone();
    match tokio::task::spawn_blocking(move || pipeline.run(&image)).await {
        Ok(outcome) => outcome.into(),
        Err(err) => {
            error!("Unhandled error: {}", err);
            ApiReply::internal(format!("{}: {}", context, err))
        }
    }
}
