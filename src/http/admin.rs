use axum::extract::Path;
use axum::Json;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

use crate::calendar::{is_valid_date_range, parse_date_only};
use crate::engine::{Entity, NewRoom, RoomPatch};
use crate::model::{DateSpan, ReservationStatus};

use super::auth::{AdminContext, Role};
use super::error::{ApiError, ApiResult};
use super::extract::{ApiJson, ApiQuery};
use super::{detached, parse_id};
use super::views::{BlockView, NotificationView, ReservationView, StatusView};

// ── Reservations ─────────────────────────────────────────────

pub async fn confirm_reservation(
    ctx: AdminContext,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusView>> {
    let id = parse_id(&id, Entity::Reservation)?;
    let engine = ctx.engine;
    let reservation = detached(async move { engine.confirm_reservation(id).await }).await?;
    Ok(Json(StatusView::from(&reservation)))
}

pub async fn cancel_reservation(
    ctx: AdminContext,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusView>> {
    let id = parse_id(&id, Entity::Reservation)?;
    let engine = ctx.engine;
    let reservation = detached(async move { engine.cancel_reservation(id).await }).await?;
    Ok(Json(StatusView::from(&reservation)))
}

#[derive(Deserialize)]
pub struct StatusFilter {
    status: Option<String>,
}

pub async fn list_reservations(
    ctx: AdminContext,
    ApiQuery(filter): ApiQuery<StatusFilter>,
) -> ApiResult<Json<Value>> {
    let status = match filter.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            ReservationStatus::parse(raw).ok_or(ApiError::BadRequest("Unknown reservation status."))?,
        ),
        None => None,
    };
    let reservations: Vec<ReservationView> = ctx
        .engine
        .list_reservations(status)
        .await?
        .into_iter()
        .map(ReservationView::from)
        .collect();
    Ok(Json(json!({ "reservations": reservations })))
}

// ── Availability blocks ──────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockBody {
    room_id: Option<String>,
    start_date: String,
    end_date: String,
    reason: Option<String>,
}

/// Block dates for one room, or the whole property when `roomId` is absent.
pub async fn create_block(
    ctx: AdminContext,
    ApiJson(body): ApiJson<BlockBody>,
) -> ApiResult<Json<Value>> {
    let span = match (parse_date_only(&body.start_date), parse_date_only(&body.end_date)) {
        (Some(start), Some(end)) if is_valid_date_range(start, end) => DateSpan::new(start, end),
        _ => return Err(ApiError::BadRequest("Invalid date range.")),
    };
    let room_id = body
        .room_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| parse_id(id, Entity::Room))
        .transpose()?;
    let engine = ctx.engine;
    let block = detached(async move { engine.add_block(room_id, span, body.reason).await }).await?;
    Ok(Json(json!({ "block": BlockView::from(block) })))
}

pub async fn list_blocks(ctx: AdminContext) -> ApiResult<Json<Value>> {
    let blocks: Vec<BlockView> = ctx
        .engine
        .list_blocks()
        .await?
        .into_iter()
        .map(BlockView::from)
        .collect();
    Ok(Json(json!({ "blocks": blocks })))
}

pub async fn delete_block(ctx: AdminContext, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, Entity::Block)?;
    let engine = ctx.engine;
    detached(async move { engine.remove_block(id).await }).await?;
    Ok(Json(json!({ "ok": true })))
}

// ── Rooms ────────────────────────────────────────────────────

pub async fn list_rooms(ctx: AdminContext) -> ApiResult<Json<Value>> {
    let rooms = ctx.engine.list_rooms(false).await?;
    Ok(Json(json!({ "rooms": rooms })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBody {
    name: String,
    description: String,
    max_guests: Option<u32>,
    #[serde(default = "active_by_default")]
    is_active: bool,
}

fn active_by_default() -> bool {
    true
}

pub async fn create_room(ctx: AdminContext, ApiJson(body): ApiJson<RoomBody>) -> ApiResult<Json<Value>> {
    let room = NewRoom {
        name: body.name,
        description: body.description,
        max_guests: body.max_guests,
        is_active: body.is_active,
    };
    let engine = ctx.engine;
    let room = detached(async move { engine.create_room(room).await }).await?;
    Ok(Json(json!({ "room": room })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPatchBody {
    name: Option<String>,
    description: Option<String>,
    /// Absent leaves the limit alone; `null` clears it.
    #[serde(default, deserialize_with = "present")]
    max_guests: Option<Option<u32>>,
    is_active: Option<bool>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub async fn update_room(
    ctx: AdminContext,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RoomPatchBody>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, Entity::Room)?;
    let patch = RoomPatch {
        name: body.name,
        description: body.description,
        max_guests: body.max_guests,
        is_active: body.is_active,
    };
    let engine = ctx.engine;
    let room = detached(async move { engine.update_room(id, patch).await }).await?;
    Ok(Json(json!({ "room": room })))
}

pub async fn delete_room(ctx: AdminContext, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, Entity::Room)?;
    let engine = ctx.engine;
    detached(async move { engine.delete_room(id).await }).await?;
    Ok(Json(json!({ "ok": true })))
}

// ── Settings ─────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSettingsBody {
    auto_confirm_bookings: bool,
}

pub async fn booking_settings(
    ctx: AdminContext,
    ApiJson(body): ApiJson<BookingSettingsBody>,
) -> ApiResult<Json<Value>> {
    ctx.require(Role::Admin)?;
    let auto_confirm = body.auto_confirm_bookings;
    let engine = ctx.engine;
    let policy = detached(async move { engine.set_auto_confirm(auto_confirm).await }).await?;
    Ok(Json(json!({ "autoConfirmBookings": policy.auto_confirm })))
}

// ── Notification log ─────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    reservation_id: Option<String>,
}

pub async fn notifications(
    ctx: AdminContext,
    ApiQuery(filter): ApiQuery<NotificationFilter>,
) -> ApiResult<Json<Value>> {
    let reservation_id = filter
        .reservation_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|id| parse_id(id, Entity::Reservation))
        .transpose()?;
    let records: Vec<NotificationView> = ctx
        .engine
        .notifications(reservation_id)
        .await?
        .into_iter()
        .map(NotificationView::from)
        .collect();
    Ok(Json(json!({ "notifications": records })))
}
