use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::calendar::{format_date_only, is_valid_date_range, parse_date_only};
use crate::engine::{BookingRequest, Entity, Onboarding};
use crate::model::{DateSpan, GuestInfo, Room};
use crate::rate_limit::{RateDecision, RateKey};

use super::auth::PublicTenant;
use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiQuery, ClientIp, DateWindow};
use super::views::{StatusView, TenantView};
use super::{detached, parse_id, AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequestBody {
    check_in_date: String,
    check_out_date: String,
    room_id: String,
    guest_name: String,
    guest_email: String,
    guest_phone: Option<String>,
    guest_count: Option<u32>,
    message: Option<String>,
    /// Honeypot. Humans never see the field, so any value means a bot.
    company: Option<String>,
}

/// Guest booking request. Checks run in order: honeypot, payload shape, room,
/// rate limit, then the conflict guard. Only well-formed requests count
/// against the client's quota.
pub async fn booking_request(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    PublicTenant(engine): PublicTenant,
    ApiJson(body): ApiJson<BookingRequestBody>,
) -> ApiResult<Json<StatusView>> {
    if body.company.as_deref().is_some_and(|c| !c.trim().is_empty()) {
        info!(tenant = %engine.slug(), %ip, "honeypot tripped, booking request dropped");
        return Err(ApiError::BadRequest("Request blocked."));
    }

    let stay = match (
        parse_date_only(&body.check_in_date),
        parse_date_only(&body.check_out_date),
    ) {
        (Some(start), Some(end)) if is_valid_date_range(start, end) => DateSpan::new(start, end),
        _ => return Err(ApiError::BadRequest("Invalid date range.")),
    };
    let room_id = parse_id(&body.room_id, Entity::Room)?;
    let request = BookingRequest {
        room_id,
        stay,
        guest: GuestInfo {
            name: body.guest_name,
            email: body.guest_email,
            phone: body.guest_phone,
            count: body.guest_count,
            message: body.message,
        },
    }
    .validated()?;
    engine.require_bookable_room(room_id).await?;

    let key = RateKey::booking_request(engine.slug(), &ip);
    if let RateDecision::Limited { retry_after_secs } = state.limiter.check(&key, state.config.booking_rate) {
        metrics::counter!(crate::observability::RATE_LIMITED_TOTAL, "action" => key.action)
            .increment(1);
        info!(%key, retry_after_secs, "booking request rate limited");
        return Err(ApiError::RateLimited { retry_after_secs });
    }

    let reservation = detached(async move { engine.request_booking(request).await }).await?;
    Ok(Json(StatusView::from(&reservation)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomFilter {
    room_id: Option<String>,
}

pub async fn availability(
    DateWindow(window): DateWindow,
    ApiQuery(filter): ApiQuery<RoomFilter>,
    PublicTenant(engine): PublicTenant,
) -> ApiResult<Json<Value>> {
    let room_id = filter
        .room_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| parse_id(id, Entity::Room))
        .transpose()?;
    let dates = engine.unavailable_dates(window, room_id).await?;
    Ok(Json(json!({
        "from": format_date_only(window.start),
        "to": format_date_only(window.end),
        "unavailableDates": dates.into_iter().map(format_date_only).collect::<Vec<_>>(),
    })))
}

pub async fn rooms_availability(
    DateWindow(window): DateWindow,
    PublicTenant(engine): PublicTenant,
) -> ApiResult<Json<Value>> {
    let rooms: Vec<Room> = engine.available_rooms(window).await?;
    Ok(Json(json!({ "rooms": rooms })))
}

pub async fn rooms(PublicTenant(engine): PublicTenant) -> ApiResult<Json<Value>> {
    let rooms = engine.list_rooms(true).await?;
    Ok(Json(json!({ "rooms": rooms })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingBody {
    slug: String,
    default_locale: String,
    contact_email: Option<String>,
    #[serde(default)]
    auto_confirm_bookings: bool,
}

pub async fn onboarding(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<OnboardingBody>,
) -> ApiResult<Json<Value>> {
    let onboarding = Onboarding {
        slug: body.slug,
        default_locale: body.default_locale,
        contact_email: body.contact_email,
        auto_confirm: body.auto_confirm_bookings,
    };
    let tenants = state.tenants.clone();
    let profile = detached(async move { tenants.onboard(onboarding).await }).await?;
    Ok(Json(json!({ "tenant": TenantView::from(profile) })))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
