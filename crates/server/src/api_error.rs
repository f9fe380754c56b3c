use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use moodscan_core::shared::error::{CameraError, InputError, StoreError};

/// Request failures, rendered as `{"success": false, "error": ...}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid image: {0}")]
    Input(#[from] InputError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error("no camera frame available")]
    NoFrame,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not save upload: {0}")]
    Upload(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Input(_) => StatusCode::BAD_REQUEST,
            // Camera trouble is an expected condition for control calls.
            ApiError::Camera(_) => StatusCode::OK,
            ApiError::NoFrame => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(_) | ApiError::Upload(_) | ApiError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::debug!("Rejected request: {self}");
        }
        (status, Json(json!({ "success": false, "error": self.to_string() }))).into_response()
    }
}
