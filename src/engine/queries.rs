use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::availability::{blocked_days, fully_booked_days, is_free};
use super::conflict::validate_window;
use super::error::Entity;
use super::{Engine, EngineError};

impl Engine {
    pub async fn profile(&self) -> Result<TenantProfile, EngineError> {
        let ledger = self.ledger.read().await;
        ledger.require_profile().cloned()
    }

    /// Days in `window` that cannot be booked.
    ///
    /// Without a room this is the property view: a day is listed only when
    /// every active room is blocked on it, and a property with no active rooms
    /// is unavailable on every day. With a room, the room's own blocked days.
    pub async fn unavailable_dates(
        &self,
        window: DateSpan,
        room_id: Option<Ulid>,
    ) -> Result<Vec<NaiveDate>, EngineError> {
        validate_window(&window)?;
        let ledger = self.ledger.read().await;
        ledger.require_profile()?;

        match room_id {
            Some(id) => {
                match ledger.room(&id) {
                    Some(room) if room.is_active => {}
                    _ => return Err(EngineError::NotFound(Entity::Room, id)),
                }
                let mut blocked = blocked_days(&[id], ledger.blocks(), ledger.reservations(), &window);
                Ok(blocked
                    .remove(&id)
                    .map(|days| days.into_iter().collect())
                    .unwrap_or_default())
            }
            None => {
                let rooms: Vec<Ulid> = ledger.active_rooms().map(|r| r.id).collect();
                let blocked = blocked_days(&rooms, ledger.blocks(), ledger.reservations(), &window);
                Ok(fully_booked_days(&blocked, &window))
            }
        }
    }

    /// Active rooms with no blocked day anywhere in `window`.
    pub async fn available_rooms(&self, window: DateSpan) -> Result<Vec<Room>, EngineError> {
        validate_window(&window)?;
        let ledger = self.ledger.read().await;
        ledger.require_profile()?;

        let rooms: Vec<&Room> = ledger.active_rooms().collect();
        let ids: Vec<Ulid> = rooms.iter().map(|r| r.id).collect();
        let blocked = blocked_days(&ids, ledger.blocks(), ledger.reservations(), &window);
        Ok(rooms
            .into_iter()
            .filter(|room| blocked.get(&room.id).is_none_or(|days| is_free(days, &window)))
            .cloned()
            .collect())
    }

    pub async fn list_rooms(&self, active_only: bool) -> Result<Vec<Room>, EngineError> {
        let ledger = self.ledger.read().await;
        ledger.require_profile()?;
        Ok(ledger
            .rooms()
            .filter(|r| !active_only || r.is_active)
            .cloned()
            .collect())
    }

    /// Newest first.
    pub async fn list_reservations(
        &self,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>, EngineError> {
        let ledger = self.ledger.read().await;
        ledger.require_profile()?;
        Ok(ledger
            .reservations()
            .rev()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    pub async fn reservation(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let ledger = self.ledger.read().await;
        ledger.require_profile()?;
        ledger
            .reservation(&id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Reservation, id))
    }

    /// Ordered by start date.
    pub async fn list_blocks(&self) -> Result<Vec<AvailabilityBlock>, EngineError> {
        let ledger = self.ledger.read().await;
        ledger.require_profile()?;
        let mut blocks: Vec<AvailabilityBlock> = ledger.blocks().cloned().collect();
        blocks.sort_by_key(|b| (b.span.start, b.id));
        Ok(blocks)
    }

    /// Latest notification attempts, newest first.
    pub async fn notifications(
        &self,
        reservation_id: Option<Ulid>,
    ) -> Result<Vec<NotificationRecord>, EngineError> {
        let ledger = self.ledger.read().await;
        ledger.require_profile()?;
        Ok(ledger
            .notifications()
            .iter()
            .rev()
            .filter(|n| reservation_id.is_none_or(|id| n.reservation_id == id))
            .take(NOTIFICATION_LOG_PAGE)
            .cloned()
            .collect())
    }

    /// True if a delivery of `template` to `recipient` already succeeded.
    pub async fn notification_sent(
        &self,
        reservation_id: Ulid,
        template: NoticeTemplate,
        recipient: &str,
    ) -> bool {
        let ledger = self.ledger.read().await;
        ledger.notification_sent(reservation_id, template, recipient)
    }
}
