use std::collections::BTreeMap;

use ulid::Ulid;

use crate::model::*;

use super::EngineError;

/// In-memory projection of one tenant's WAL.
///
/// Maps are keyed by ULID, so iteration order is creation order.
#[derive(Debug)]
pub struct Ledger {
    slug: String,
    profile: Option<TenantProfile>,
    rooms: BTreeMap<Ulid, Room>,
    blocks: BTreeMap<Ulid, AvailabilityBlock>,
    reservations: BTreeMap<Ulid, Reservation>,
    notifications: Vec<NotificationRecord>,
}

impl Ledger {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            profile: None,
            rooms: BTreeMap::new(),
            blocks: BTreeMap::new(),
            reservations: BTreeMap::new(),
            notifications: Vec::new(),
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    // ── Tenant ───────────────────────────────────────────────

    pub fn profile(&self) -> Option<&TenantProfile> {
        self.profile.as_ref()
    }

    /// The tenant profile, or `TenantNotFound` if onboarding never committed.
    pub fn require_profile(&self) -> Result<&TenantProfile, EngineError> {
        self.profile
            .as_ref()
            .ok_or_else(|| EngineError::TenantNotFound(self.slug.clone()))
    }

    // ── Rooms ────────────────────────────────────────────────

    pub fn room(&self, id: &Ulid) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn active_rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values().filter(|r| r.is_active)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    // ── Blocks ───────────────────────────────────────────────

    pub fn block(&self, id: &Ulid) -> Option<&AvailabilityBlock> {
        self.blocks.get(id)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &AvailabilityBlock> {
        self.blocks.values()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks that apply to `room_id`, property-wide ones included.
    pub fn blocks_for(&self, room_id: Ulid) -> impl Iterator<Item = &AvailabilityBlock> {
        self.blocks.values().filter(move |b| b.scope.applies_to(room_id))
    }

    // ── Reservations ─────────────────────────────────────────

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.get(id)
    }

    pub fn reservations(&self) -> impl DoubleEndedIterator<Item = &Reservation> {
        self.reservations.values()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    /// Confirmed reservations on `room_id`.
    pub fn confirmed_for(&self, room_id: Ulid) -> impl Iterator<Item = &Reservation> {
        self.reservations
            .values()
            .filter(move |r| r.room_id == room_id && r.holds_room())
    }

    // ── Notifications ────────────────────────────────────────

    pub fn notifications(&self) -> &[NotificationRecord] {
        &self.notifications
    }

    pub fn notification_sent(
        &self,
        reservation_id: Ulid,
        template: NoticeTemplate,
        recipient: &str,
    ) -> bool {
        self.notifications.iter().any(|n| {
            n.reservation_id == reservation_id
                && n.template == template
                && n.recipient == recipient
                && n.status == DeliveryStatus::Sent
        })
    }

    // ── Event application ────────────────────────────────────

    /// Apply a committed event. Callers append to the WAL first.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::TenantOnboarded { profile } => {
                self.profile = Some(profile.clone());
            }
            Event::BookingPolicyChanged { policy } => {
                if let Some(profile) = self.profile.as_mut() {
                    profile.policy = *policy;
                }
            }
            Event::RoomCreated { room } | Event::RoomUpdated { room } => {
                self.rooms.insert(room.id, room.clone());
            }
            Event::RoomDeleted { id } => {
                self.rooms.remove(id);
                self.blocks.retain(|_, b| b.scope != Scope::Room(*id));
            }
            Event::BlockAdded { block } => {
                self.blocks.insert(block.id, block.clone());
            }
            Event::BlockRemoved { id } => {
                self.blocks.remove(id);
            }
            Event::ReservationCreated { reservation } => {
                self.reservations.insert(reservation.id, reservation.clone());
            }
            Event::ReservationConfirmed { id, at } => {
                if let Some(r) = self.reservations.get_mut(id) {
                    r.status = ReservationStatus::Confirmed;
                    r.updated_at = *at;
                }
            }
            Event::ReservationCancelled { id, at } => {
                if let Some(r) = self.reservations.get_mut(id) {
                    r.status = ReservationStatus::Cancelled;
                    r.updated_at = *at;
                }
            }
            Event::NotificationRecorded { record } => {
                self.notifications.push(record.clone());
            }
        }
    }

    /// The minimal event sequence that rebuilds this ledger.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(
            1 + self.rooms.len()
                + self.blocks.len()
                + self.reservations.len()
                + self.notifications.len(),
        );
        if let Some(profile) = &self.profile {
            events.push(Event::TenantOnboarded {
                profile: profile.clone(),
            });
        }
        events.extend(self.rooms.values().map(|room| Event::RoomCreated { room: room.clone() }));
        events.extend(self.blocks.values().map(|block| Event::BlockAdded { block: block.clone() }));
        events.extend(self.reservations.values().map(|reservation| {
            Event::ReservationCreated {
                reservation: reservation.clone(),
            }
        }));
        events.extend(
            self.notifications
                .iter()
                .map(|record| Event::NotificationRecorded { record: record.clone() }),
        );
        events
    }
}
