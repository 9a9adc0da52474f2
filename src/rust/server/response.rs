use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::classifier::ModelInfo;
use crate::decoder::DecodeError;
use crate::pipeline::{Fault, Outcome};

/// Every JSON body the service returns.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApiResponse {
    Success {
        predicted_sign: String,
        confidence: f32,
    },
    NoHand {
        message: String,
        predicted_sign: Option<String>,
        confidence: f32,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        predicted_sign: Option<Option<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
    },
    #[serde(rename = "success")]
    ModelInfo { model_info: ModelInfo },
    Healthy {
        service: &'static str,
        version: &'static str,
    },
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { error: message.into(), predicted_sign: None, confidence: None }
    }

    /// Pipeline errors also carry an empty prediction, like the other outcomes.
    fn pipeline_error(message: String) -> Self {
        Self::Error { error: message, predicted_sign: Some(None), confidence: Some(0.0) }
    }
}

/// A status code with a JSON body.
pub struct ApiReply(pub StatusCode, pub ApiResponse);

impl ApiReply {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, ApiResponse::error(message))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self(StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::error(message))
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

impl From<DecodeError> for ApiReply {
    fn from(err: DecodeError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<Outcome> for ApiReply {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success { label, confidence } => Self(
                StatusCode::OK,
                ApiResponse::Success { predicted_sign: label, confidence },
            ),
            Outcome::NoHand { message } => Self(
                StatusCode::OK,
                ApiResponse::NoHand { message, predicted_sign: None, confidence: 0.0 },
            ),
            Outcome::Error { message, fault } => {
                let status = match fault {
                    Fault::Client => StatusCode::BAD_REQUEST,
                    Fault::Server => StatusCode::INTERNAL_SERVER_ERROR,
                };
                Self(status, ApiResponse::pipeline_error(message))
            }
        }
    }
}
