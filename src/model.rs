use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::calendar;

/// Unix milliseconds, used for audit timestamps only. Stays are `NaiveDate`s.
pub type Ms = i64;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or_default()
}

/// Half-open range of calendar days `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "DateSpan start must be before end");
        Self { start, end }
    }

    /// `None` for empty or inverted ranges.
    pub fn checked(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        calendar::is_valid_date_range(start, end).then_some(Self { start, end })
    }

    pub fn nights(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days()
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        calendar::ranges_overlap(self.start, self.end, other.start, other.end)
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start <= day && day < self.end
    }

    /// Intersection with `window`, if any.
    pub fn clamp_to(&self, window: &DateSpan) -> Option<DateSpan> {
        DateSpan::checked(self.start.max(window.start), self.end.min(window.end))
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        calendar::days_between(self.start, self.end)
    }
}

/// Which rooms an availability block applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Room(Ulid),
    /// Every room of the property, including rooms created after the block.
    PropertyWide,
}

impl Scope {
    pub fn applies_to(&self, room_id: Ulid) -> bool {
        match self {
            Scope::Room(id) => *id == room_id,
            Scope::PropertyWide => true,
        }
    }

    pub fn room_id(&self) -> Option<Ulid> {
        match self {
            Scope::Room(id) => Some(*id),
            Scope::PropertyWide => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPolicy {
    pub auto_confirm: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantProfile {
    pub id: Ulid,
    pub slug: String,
    pub default_locale: String,
    /// Host recipient for booking notifications.
    pub contact_email: Option<String>,
    pub property_id: Ulid,
    pub policy: BookingPolicy,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: Ulid,
    pub property_id: Ulid,
    pub name: String,
    pub description: String,
    pub max_guests: Option<u32>,
    pub is_active: bool,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityBlock {
    pub id: Ulid,
    pub property_id: Ulid,
    pub scope: Scope,
    pub span: DateSpan,
    pub reason: Option<String>,
    pub created_at: Ms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(ReservationStatus::Pending),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "CANCELLED" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationSource {
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub count: Option<u32>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub property_id: Ulid,
    pub room_id: Ulid,
    pub stay: DateSpan,
    pub status: ReservationStatus,
    pub source: ReservationSource,
    pub guest: GuestInfo,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Reservation {
    /// Only confirmed reservations exclude other holds on the room.
    pub fn holds_room(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeTemplate {
    BookingRequestGuest,
    BookingRequestHost,
    BookingConfirmedGuest,
    BookingConfirmedHost,
    BookingCancelledGuest,
    BookingCancelledHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    Skipped,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Skipped => "skipped",
        }
    }
}

/// Audit entry for one notification attempt against a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Ulid,
    pub reservation_id: Ulid,
    pub template: NoticeTemplate,
    pub recipient: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub created_at: Ms,
}

/// The WAL record format. One flat enum; every ledger mutation is one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    TenantOnboarded {
        profile: TenantProfile,
    },
    BookingPolicyChanged {
        policy: BookingPolicy,
    },
    RoomCreated {
        room: Room,
    },
    RoomUpdated {
        room: Room,
    },
    RoomDeleted {
        id: Ulid,
    },
    BlockAdded {
        block: AvailabilityBlock,
    },
    BlockRemoved {
        id: Ulid,
    },
    ReservationCreated {
        reservation: Reservation,
    },
    ReservationConfirmed {
        id: Ulid,
        at: Ms,
    },
    ReservationCancelled {
        id: Ulid,
        at: Ms,
    },
    NotificationRecorded {
        record: NotificationRecord,
    },
}
