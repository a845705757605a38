use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::algorithm::RegistryError;
use crate::coordinator::CoordinatorError;
use crate::telemetry::TelemetryError;
use crate::web::auth::PermissionError;

pub enum ApiError {
    Permission(PermissionError),
    Validation(&'static str, String),
    Conflict(&'static str),
    Unavailable(String),
}

impl From<PermissionError> for ApiError {
    fn from(e: PermissionError) -> Self {
        ApiError::Permission(e)
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownAlgorithm(_) => {
                ApiError::Validation("unknown_algorithm", e.to_string())
            }
            RegistryError::InvalidAlgorithmConfig { .. } => {
                ApiError::Validation("invalid_algorithm_config", e.to_string())
            }
        }
    }
}

impl From<CoordinatorError> for ApiError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::NotConfigured => ApiError::Conflict("not_configured"),
            CoordinatorError::Faulted => ApiError::Conflict("coordinator_faulted"),
            CoordinatorError::Stopped => ApiError::Unavailable(e.to_string()),
            CoordinatorError::Registry(e) => e.into(),
        }
    }
}

impl From<TelemetryError> for ApiError {
    fn from(e: TelemetryError) -> Self {
        match e {
            TelemetryError::Malformed { .. } => {
                ApiError::Validation("malformed_sample", e.to_string())
            }
            TelemetryError::Closed => ApiError::Unavailable(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Permission(e) => e.into_response(),
            ApiError::Validation(error, msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_message(error, &msg)),
            )
                .into_response(),
            ApiError::Conflict(reason) => {
                (StatusCode::CONFLICT, Json(ErrorResponse::new(reason))).into_response()
            }
            ApiError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::with_message("coordinator_unavailable", &msg)),
            )
                .into_response(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: None,
        }
    }

    pub fn with_message(error: &str, message: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: Some(message.to_string()),
        }
    }
}
