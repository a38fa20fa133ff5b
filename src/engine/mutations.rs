use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::{ChangeKind, StatusChange};

use super::conflict::{check_block_admissible, check_no_conflict};
use super::error::Entity;
use super::input::validate_block_reason;
use super::{BookingRequest, Engine, EngineError, NewRoom, Onboarding, RoomPatch, Transition};

impl Engine {
    // ── Tenant ───────────────────────────────────────────────

    pub async fn onboard(&self, onboarding: Onboarding) -> Result<TenantProfile, EngineError> {
        let onboarding = onboarding.validated()?;
        if onboarding.slug != self.slug() {
            return Err(EngineError::Validation("slug does not match tenant"));
        }

        let mut ledger = self.ledger.write().await;
        if ledger.profile().is_some() {
            return Err(EngineError::AlreadyExists(onboarding.slug));
        }

        let profile = TenantProfile {
            id: Ulid::new(),
            slug: onboarding.slug,
            default_locale: onboarding.default_locale,
            contact_email: onboarding.contact_email,
            property_id: Ulid::new(),
            policy: BookingPolicy {
                auto_confirm: onboarding.auto_confirm,
            },
            created_at: now_ms(),
        };
        self.persist_and_apply(
            &mut ledger,
            Event::TenantOnboarded {
                profile: profile.clone(),
            },
        )
        .await?;
        info!(tenant = %profile.slug, "tenant onboarded");
        Ok(profile)
    }

    pub async fn set_auto_confirm(&self, auto_confirm: bool) -> Result<BookingPolicy, EngineError> {
        let mut ledger = self.ledger.write().await;
        let current = ledger.require_profile()?.policy;
        let policy = BookingPolicy { auto_confirm };
        if current != policy {
            self.persist_and_apply(&mut ledger, Event::BookingPolicyChanged { policy })
                .await?;
        }
        Ok(policy)
    }

    // ── Rooms ────────────────────────────────────────────────

    pub async fn create_room(&self, room: NewRoom) -> Result<Room, EngineError> {
        let room = room.validated()?;
        let mut ledger = self.ledger.write().await;
        let property_id = ledger.require_profile()?.property_id;
        if ledger.room_count() >= MAX_ROOMS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }

        let room = Room {
            id: Ulid::new(),
            property_id,
            name: room.name,
            description: room.description,
            max_guests: room.max_guests,
            is_active: room.is_active,
            created_at: now_ms(),
        };
        self.persist_and_apply(&mut ledger, Event::RoomCreated { room: room.clone() })
            .await?;
        Ok(room)
    }

    pub async fn update_room(&self, id: Ulid, patch: RoomPatch) -> Result<Room, EngineError> {
        let mut ledger = self.ledger.write().await;
        ledger.require_profile()?;
        let current = ledger
            .room(&id)
            .ok_or(EngineError::NotFound(Entity::Room, id))?;
        let room = patch.apply_to(current)?;
        if &room != current {
            self.persist_and_apply(&mut ledger, Event::RoomUpdated { room: room.clone() })
                .await?;
        }
        Ok(room)
    }

    /// Delete a room and the blocks scoped to it. The last room cannot go.
    pub async fn delete_room(&self, id: Ulid) -> Result<(), EngineError> {
        let mut ledger = self.ledger.write().await;
        ledger.require_profile()?;
        if ledger.room(&id).is_none() {
            return Err(EngineError::NotFound(Entity::Room, id));
        }
        if ledger.room_count() <= 1 {
            return Err(EngineError::LastRoom(id));
        }
        self.persist_and_apply(&mut ledger, Event::RoomDeleted { id }).await
    }

    // ── Blocks ───────────────────────────────────────────────

    /// Block `span` for one room, or for the whole property when `room_id` is `None`.
    pub async fn add_block(
        &self,
        room_id: Option<Ulid>,
        span: DateSpan,
        reason: Option<String>,
    ) -> Result<AvailabilityBlock, EngineError> {
        if span.nights() > MAX_STAY_NIGHTS {
            return Err(EngineError::LimitExceeded("block too long"));
        }
        let reason = validate_block_reason(reason)?;

        let mut ledger = self.ledger.write().await;
        let property_id = ledger.require_profile()?.property_id;
        let scope = match room_id {
            Some(id) if ledger.room(&id).is_none() => {
                return Err(EngineError::NotFound(Entity::Room, id));
            }
            Some(id) => Scope::Room(id),
            None => Scope::PropertyWide,
        };
        if ledger.block_count() >= MAX_BLOCKS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many blocks"));
        }
        check_block_admissible(&ledger, scope, &span)?;

        let block = AvailabilityBlock {
            id: Ulid::new(),
            property_id,
            scope,
            span,
            reason,
            created_at: now_ms(),
        };
        self.persist_and_apply(&mut ledger, Event::BlockAdded { block: block.clone() })
            .await?;
        Ok(block)
    }

    pub async fn remove_block(&self, id: Ulid) -> Result<(), EngineError> {
        let mut ledger = self.ledger.write().await;
        ledger.require_profile()?;
        if ledger.block(&id).is_none() {
            return Err(EngineError::NotFound(Entity::Block, id));
        }
        self.persist_and_apply(&mut ledger, Event::BlockRemoved { id }).await
    }

    // ── Reservations ─────────────────────────────────────────

    /// Fails with `NotFound` unless `room_id` names an active room.
    pub async fn require_bookable_room(&self, room_id: Ulid) -> Result<Room, EngineError> {
        let ledger = self.ledger.read().await;
        ledger.require_profile()?;
        match ledger.room(&room_id) {
            Some(room) if room.is_active => Ok(room.clone()),
            _ => Err(EngineError::NotFound(Entity::Room, room_id)),
        }
    }

    /// Create a reservation under the tenant's current policy.
    ///
    /// The room, the policy, and every hold on the room are re-read under the
    /// write guard, so two overlapping requests can never both commit as
    /// CONFIRMED.
    pub async fn request_booking(&self, request: BookingRequest) -> Result<Reservation, EngineError> {
        let request = request.validated()?;

        let mut ledger = self.ledger.write().await;
        let profile = ledger.require_profile()?;
        let (property_id, policy) = (profile.property_id, profile.policy);
        match ledger.room(&request.room_id) {
            Some(room) if room.is_active => {}
            _ => return Err(EngineError::NotFound(Entity::Room, request.room_id)),
        }
        if ledger.reservation_count() >= MAX_RESERVATIONS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many reservations"));
        }
        if let Err(e) = check_no_conflict(&ledger, request.room_id, &request.stay, None) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            debug!(tenant = %self.slug(), room = %request.room_id, "booking request conflicts: {e}");
            return Err(e);
        }

        let now = now_ms();
        let reservation = Reservation {
            id: Ulid::new(),
            property_id,
            room_id: request.room_id,
            stay: request.stay,
            status: ReservationStatus::initial(policy),
            source: ReservationSource::Direct,
            guest: request.guest,
            created_at: now,
            updated_at: now,
        };
        self.persist_and_apply(
            &mut ledger,
            Event::ReservationCreated {
                reservation: reservation.clone(),
            },
        )
        .await?;
        drop(ledger);

        metrics::counter!(
            crate::observability::RESERVATIONS_CREATED_TOTAL,
            "status" => reservation.status.as_str()
        )
        .increment(1);
        info!(
            tenant = %self.slug(),
            reservation = %reservation.id,
            status = %reservation.status,
            "reservation created"
        );
        self.announce(StatusChange {
            kind: ChangeKind::Requested,
            reservation: reservation.clone(),
        });
        Ok(reservation)
    }

    /// PENDING to CONFIRMED, re-validated against blocks and confirmed stays.
    pub async fn confirm_reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let mut ledger = self.ledger.write().await;
        ledger.require_profile()?;
        let existing = ledger
            .reservation(&id)
            .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
        existing.status.confirm(id)?;
        let (room_id, stay) = (existing.room_id, existing.stay);
        match ledger.room(&room_id) {
            Some(room) if room.is_active => {}
            _ => return Err(EngineError::NotFound(Entity::Room, room_id)),
        }
        if let Err(e) = check_no_conflict(&ledger, room_id, &stay, Some(id)) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        self.persist_and_apply(&mut ledger, Event::ReservationConfirmed { id, at: now_ms() })
            .await?;
        let reservation = ledger
            .reservation(&id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
        drop(ledger);

        metrics::counter!(crate::observability::RESERVATIONS_CONFIRMED_TOTAL).increment(1);
        info!(tenant = %self.slug(), reservation = %id, "reservation confirmed");
        self.announce(StatusChange {
            kind: ChangeKind::Confirmed,
            reservation: reservation.clone(),
        });
        Ok(reservation)
    }

    /// Cancel from PENDING or CONFIRMED. Cancelling twice is a no-op that
    /// writes nothing and announces nothing.
    pub async fn cancel_reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let mut ledger = self.ledger.write().await;
        ledger.require_profile()?;
        let existing = ledger
            .reservation(&id)
            .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
        if let Transition::Unchanged(_) = existing.status.cancel() {
            return Ok(existing.clone());
        }

        self.persist_and_apply(&mut ledger, Event::ReservationCancelled { id, at: now_ms() })
            .await?;
        let reservation = ledger
            .reservation(&id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Reservation, id))?;
        drop(ledger);

        metrics::counter!(crate::observability::RESERVATIONS_CANCELLED_TOTAL).increment(1);
        info!(tenant = %self.slug(), reservation = %id, "reservation cancelled");
        self.announce(StatusChange {
            kind: ChangeKind::Cancelled,
            reservation: reservation.clone(),
        });
        Ok(reservation)
    }

    // ── Notification log ─────────────────────────────────────

    pub async fn record_notification(&self, record: NotificationRecord) -> Result<(), EngineError> {
        let mut ledger = self.ledger.write().await;
        self.persist_and_apply(&mut ledger, Event::NotificationRecorded { record })
            .await
    }

    // ── Compaction ───────────────────────────────────────────

    /// Rewrite the WAL as the minimal event set for the current ledger.
    ///
    /// The read guard is held until the writer task has swapped files, so no
    /// mutation can append between snapshot and swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let ledger = self.ledger.read().await;
        let events = ledger.snapshot_events();
        self.wal.compact(events).await?;
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        self.wal.appends_since_compact().await
    }

    /// True after a failed WAL commit. Mutations fail until [`Engine::compact_wal`]
    /// rewrites the log from the ledger.
    pub async fn wal_poisoned(&self) -> bool {
        self.wal.is_poisoned().await
    }
}
