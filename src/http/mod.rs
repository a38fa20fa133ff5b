//! HTTP surface: the guest storefront API and the admin API.

mod admin;
mod auth;
mod error;
mod extract;
mod public;
mod views;

pub use auth::{tenant_slug_from_host, Role};
pub use error::{ApiError, ApiResult};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::warn;
use ulid::Ulid;

use crate::config::Config;
use crate::engine::{EngineError, Entity};
use crate::rate_limit::RateLimiter;
use crate::tenant::TenantManager;

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    pub tenants: Arc<TenantManager>,
    pub limiter: Arc<dyn RateLimiter>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::<AppState>::new()
        .route("/api/booking-request", post(public::booking_request))
        .route("/api/availability", get(public::availability))
        .route("/api/rooms/availability", get(public::rooms_availability))
        .route("/api/rooms", get(public::rooms))
        .route("/api/onboarding", post(public::onboarding));

    let admin_routes = Router::<AppState>::new()
        .route("/api/admin/reservations", get(admin::list_reservations))
        .route(
            "/api/admin/reservations/{id}/confirm",
            post(admin::confirm_reservation),
        )
        .route(
            "/api/admin/reservations/{id}/cancel",
            post(admin::cancel_reservation),
        )
        .route(
            "/api/admin/availability/blocks",
            get(admin::list_blocks).post(admin::create_block),
        )
        .route(
            "/api/admin/availability/blocks/{id}",
            delete(admin::delete_block),
        )
        .route("/api/admin/rooms", get(admin::list_rooms).post(admin::create_room))
        .route(
            "/api/admin/rooms/{id}",
            patch(admin::update_room).delete(admin::delete_room),
        )
        .route("/api/admin/booking-settings", post(admin::booking_settings))
        .route("/api/admin/notifications", get(admin::notifications));

    let in_flight = Arc::new(Semaphore::new(state.config.max_connections));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .route_layer(middleware::from_fn(record_metrics))
        .route_layer(middleware::from_fn_with_state(in_flight, limit_in_flight))
        .route("/health", get(public::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject with 503 once `max_connections` requests are in flight.
async fn limit_in_flight(State(permits): State<Arc<Semaphore>>, req: Request, next: Next) -> Response {
    let Ok(_permit) = permits.try_acquire_owned() else {
        warn!("request limit reached, rejecting");
        metrics::counter!(crate::observability::REQUESTS_REJECTED_TOTAL).increment(1);
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Server busy. Please retry." })),
        )
            .into_response();
    };
    next.run(req).await
}

/// Per-route request counts and latency.
async fn record_metrics(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".into());
    let started = Instant::now();
    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics::histogram!(crate::observability::HTTP_REQUEST_DURATION_SECONDS, "route" => route.clone())
        .record(started.elapsed().as_secs_f64());
    metrics::counter!(crate::observability::HTTP_REQUESTS_TOTAL, "route" => route, "status" => status)
        .increment(1);
    response
}

/// Unparsable ids cannot name anything, so they are reported as not found.
fn parse_id(raw: &str, entity: Entity) -> Result<Ulid, ApiError> {
    Ulid::from_string(raw.trim()).map_err(|_| ApiError::NotFound(entity))
}

/// Run a ledger mutation on its own task so a dropped connection cannot cancel
/// it between the WAL append and the in-memory apply.
async fn detached<T, F>(mutation: F) -> ApiResult<T>
where
    F: Future<Output = Result<T, EngineError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(mutation)
        .await
        .map_err(|e| EngineError::WalError(format!("mutation task failed: {e}")))?
        .map_err(ApiError::from)
}
