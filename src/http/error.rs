use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::engine::EngineError;

/// Field name → list of messages, the shape validation errors take on
/// the wire. Cross-field problems go under `non_field_errors`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug)]
pub enum ApiError {
    Validation(FieldErrors),
    Unauthorized(&'static str),
    NotFound,
    Internal(String),
}

impl ApiError {
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name.to_string(), vec![message.into()]);
        Self::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            ApiError::Unauthorized(detail) => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": detail })),
            )
                .into_response(),
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Internal(detail) => {
                tracing::error!("internal error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(_) => ApiError::NotFound,
            EngineError::EmailTaken(_) => {
                ApiError::field("email", "a client with this email already exists")
            }
            EngineError::UsernameTaken(_) => {
                ApiError::field("username", "an employee with this username already exists")
            }
            EngineError::UnknownReference { field, id } => {
                ApiError::field(field, format!("object with id {id} does not exist"))
            }
            EngineError::Conflict(id) => ApiError::field(
                "non_field_errors",
                format!("the room is already reserved over this period (reservation {id})"),
            ),
            EngineError::InvalidRange => {
                ApiError::field("non_field_errors", "end date must not precede start date")
            }
            EngineError::LimitExceeded(what) => ApiError::field("non_field_errors", what),
            EngineError::WalError(detail) => ApiError::Internal(detail),
        }
    }
}
