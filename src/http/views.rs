//! JSON shapes for the HTTP surface. Dates render as `YYYY-MM-DD`.

use serde::Serialize;
use ulid::Ulid;

use crate::calendar::format_date_only;
use crate::model::*;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub id: Ulid,
    pub status: ReservationStatus,
}

impl From<&Reservation> for StatusView {
    fn from(r: &Reservation) -> Self {
        Self {
            id: r.id,
            status: r.status,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantView {
    pub id: Ulid,
    pub slug: String,
    pub default_locale: String,
    pub contact_email: Option<String>,
    pub property_id: Ulid,
    pub auto_confirm_bookings: bool,
}

impl From<TenantProfile> for TenantView {
    fn from(p: TenantProfile) -> Self {
        Self {
            id: p.id,
            slug: p.slug,
            default_locale: p.default_locale,
            contact_email: p.contact_email,
            property_id: p.property_id,
            auto_confirm_bookings: p.policy.auto_confirm,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    pub id: Ulid,
    pub room_id: Ulid,
    pub check_in_date: String,
    pub check_out_date: String,
    pub nights: i64,
    pub status: ReservationStatus,
    pub source: ReservationSource,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub guest_count: Option<u32>,
    pub message: Option<String>,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl From<Reservation> for ReservationView {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            room_id: r.room_id,
            check_in_date: format_date_only(r.stay.start),
            check_out_date: format_date_only(r.stay.end),
            nights: r.stay.nights(),
            status: r.status,
            source: r.source,
            guest_name: r.guest.name,
            guest_email: r.guest.email,
            guest_phone: r.guest.phone,
            guest_count: r.guest.count,
            message: r.guest.message,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockView {
    pub id: Ulid,
    /// `None` for a property-wide block.
    pub room_id: Option<Ulid>,
    pub start_date: String,
    pub end_date: String,
    pub reason: Option<String>,
    pub created_at: Ms,
}

impl From<AvailabilityBlock> for BlockView {
    fn from(b: AvailabilityBlock) -> Self {
        Self {
            id: b.id,
            room_id: b.scope.room_id(),
            start_date: format_date_only(b.span.start),
            end_date: format_date_only(b.span.end),
            reason: b.reason,
            created_at: b.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: Ulid,
    pub reservation_id: Ulid,
    pub template: NoticeTemplate,
    pub recipient: String,
    pub status: &'static str,
    pub error: Option<String>,
    pub created_at: Ms,
}

impl From<NotificationRecord> for NotificationView {
    fn from(n: NotificationRecord) -> Self {
        Self {
            id: n.id,
            reservation_id: n.reservation_id,
            template: n.template,
            recipient: n.recipient,
            status: n.status.as_str(),
            error: n.error,
            created_at: n.created_at,
        }
    }
}
