use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::engine::{EngineError, Entity};

/// Error returned by every handler. Rendered as `{ "error": message }`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Tenant not resolved.")]
    TenantUnresolved,
    #[error("Authentication required.")]
    Unauthorized,
    #[error("Insufficient role.")]
    Forbidden,
    #[error("{0} not found.")]
    NotFound(Entity),
    #[error("Too many requests. Please try again later.")]
    RateLimited { retry_after_secs: u64 },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::TenantUnresolved => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Engine(e) => match e {
                EngineError::Validation(_)
                | EngineError::InvalidTransition { .. }
                | EngineError::LastRoom(_)
                | EngineError::LimitExceeded(_) => StatusCode::BAD_REQUEST,
                EngineError::NotFound(..) | EngineError::TenantNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::Conflict(_) | EngineError::AlreadyExists(_) => StatusCode::CONFLICT,
                EngineError::WalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Client-facing message. Storage failures are not described.
    fn message(&self) -> String {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::Validation(msg) | EngineError::LimitExceeded(msg) => capitalize(msg),
                EngineError::NotFound(entity, _) => capitalize(&format!("{entity} not found.")),
                EngineError::TenantNotFound(_) => "Tenant not found.".into(),
                EngineError::Conflict(_) => "These dates are no longer available.".into(),
                EngineError::InvalidTransition { from, .. } => {
                    format!("Reservation is {}, not pending.", from.as_str().to_lowercase())
                }
                EngineError::AlreadyExists(_) => "Slug is already taken.".into(),
                EngineError::LastRoom(_) => "Cannot delete the last room.".into(),
                EngineError::WalError(_) => "Internal server error.".into(),
            },
            ApiError::NotFound(entity) => capitalize(&format!("{entity} not found.")),
            other => other.to_string(),
        }
    }
}

fn capitalize(msg: &str) -> String {
    let mut chars = msg.chars();
    match chars.next() {
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.push_str(chars.as_str());
            if !out.ends_with('.') {
                out.push('.');
            }
            out
        }
        None => String::new(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        let mut response = (status, Json(json!({ "error": self.message() }))).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
