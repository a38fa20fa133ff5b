use std::convert::Infallible;

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::calendar::{is_valid_date_range, parse_date_only};
use crate::model::DateSpan;

use super::error::ApiError;

/// `Json<T>` whose rejection renders as a 400 `ApiError`.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            debug!("rejected payload: {e}");
            ApiError::BadRequest("Invalid request payload.")
        })?;
        Ok(Self(value))
    }
}

/// `Query<T>` whose rejection renders as a 400 `ApiError`.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                debug!("rejected query: {e}");
                ApiError::BadRequest("Invalid query parameters.")
            })?;
        Ok(Self(value))
    }
}

#[derive(Deserialize)]
struct RawWindow {
    from: Option<String>,
    to: Option<String>,
}

/// The `?from=YYYY-MM-DD&to=YYYY-MM-DD` window, validated as a non-empty
/// half-open date range.
pub struct DateWindow(pub DateSpan);

impl<S> FromRequestParts<S> for DateWindow
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let invalid = || ApiError::BadRequest("Invalid date range.");
        let Query(raw) = Query::<RawWindow>::from_request_parts(parts, state)
            .await
            .map_err(|_| invalid())?;
        let from = raw.from.as_deref().and_then(parse_date_only).ok_or_else(invalid)?;
        let to = raw.to.as_deref().and_then(parse_date_only).ok_or_else(invalid)?;
        if !is_valid_date_range(from, to) {
            return Err(invalid());
        }
        Ok(Self(DateSpan::new(from, to)))
    }
}

/// Caller address as reported by the fronting proxy, or `"unknown"`.
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let ip = header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .or_else(|| header("x-real-ip"))
            .unwrap_or("unknown");
        Ok(Self(ip.to_string()))
    }
}
