//! HTTP error mapping for registry handlers

use crate::registry::RegistryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Errors surfaced on the HTTP boundary
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(_) => Self::NotFound(e.to_string()),
            RegistryError::AlreadyBound(_) => Self::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Conflict(m) => (StatusCode::CONFLICT, m),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
