//! Reservation lifecycle: `PENDING -> CONFIRMED -> CANCELLED`.
//!
//! CANCELLED is absorbing and there is no way back from CONFIRMED to PENDING.
//! Whether a confirmation is *allowed* by the calendar is the conflict guard's
//! business; this module only knows which status moves exist.

use ulid::Ulid;

use crate::model::{BookingPolicy, ReservationStatus};

use super::EngineError;

/// Outcome of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed(ReservationStatus),
    /// Already in the target state; nothing to persist.
    Unchanged(ReservationStatus),
}

impl ReservationStatus {
    /// Status a new reservation is born with, given the policy read at creation time.
    pub fn initial(policy: BookingPolicy) -> Self {
        if policy.auto_confirm {
            ReservationStatus::Confirmed
        } else {
            ReservationStatus::Pending
        }
    }

    /// Only PENDING may be confirmed.
    pub fn confirm(self, id: Ulid) -> Result<Self, EngineError> {
        match self {
            ReservationStatus::Pending => Ok(ReservationStatus::Confirmed),
            from => Err(EngineError::InvalidTransition {
                id,
                from,
                to: ReservationStatus::Confirmed,
            }),
        }
    }

    /// Always permitted; a second cancel is a no-op.
    pub fn cancel(self) -> Transition {
        match self {
            ReservationStatus::Cancelled => Transition::Unchanged(self),
            ReservationStatus::Pending | ReservationStatus::Confirmed => {
                Transition::Changed(ReservationStatus::Cancelled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_follows_policy() {
        assert_eq!(
            ReservationStatus::initial(BookingPolicy { auto_confirm: true }),
            ReservationStatus::Confirmed
        );
        assert_eq!(
            ReservationStatus::initial(BookingPolicy { auto_confirm: false }),
            ReservationStatus::Pending
        );
    }

    #[test]
    fn confirm_only_from_pending() {
        let id = Ulid::new();
        assert_eq!(
            ReservationStatus::Pending.confirm(id).unwrap(),
            ReservationStatus::Confirmed
        );
        assert!(matches!(
            ReservationStatus::Confirmed.confirm(id),
            Err(EngineError::InvalidTransition { from: ReservationStatus::Confirmed, .. })
        ));
        assert!(matches!(
            ReservationStatus::Cancelled.confirm(id),
            Err(EngineError::InvalidTransition { from: ReservationStatus::Cancelled, .. })
        ));
    }

    #[test]
    fn cancel_is_idempotent() {
        assert_eq!(
            ReservationStatus::Pending.cancel(),
            Transition::Changed(ReservationStatus::Cancelled)
        );
        assert_eq!(
            ReservationStatus::Confirmed.cancel(),
            Transition::Changed(ReservationStatus::Cancelled)
        );
        assert_eq!(
            ReservationStatus::Cancelled.cancel(),
            Transition::Unchanged(ReservationStatus::Cancelled)
        );
    }
}
