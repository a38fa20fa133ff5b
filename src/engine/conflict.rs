use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::error::Holder;
use super::store::Ledger;
use super::EngineError;

pub(crate) fn validate_stay(span: &DateSpan) -> Result<(), EngineError> {
    if span.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

pub(crate) fn validate_window(window: &DateSpan) -> Result<(), EngineError> {
    if window.nights() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

/// First exclusionary hold on `room_id` overlapping `span`.
///
/// Blocks (room-scoped or property-wide) are checked before confirmed
/// reservations. `exclude` skips the reservation being confirmed. Pending and
/// cancelled reservations never conflict.
pub(crate) fn find_conflict(
    ledger: &Ledger,
    room_id: Ulid,
    span: &DateSpan,
    exclude: Option<Ulid>,
) -> Option<Holder> {
    if let Some(block) = ledger.blocks_for(room_id).find(|b| b.span.overlaps(span)) {
        return Some(Holder::Block(block.id));
    }
    ledger
        .confirmed_for(room_id)
        .filter(|r| Some(r.id) != exclude)
        .find(|r| r.stay.overlaps(span))
        .map(|r| Holder::Reservation(r.id))
}

pub(crate) fn check_no_conflict(
    ledger: &Ledger,
    room_id: Ulid,
    span: &DateSpan,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    match find_conflict(ledger, room_id, span, exclude) {
        Some(holder) => Err(EngineError::Conflict(holder)),
        None => Ok(()),
    }
}

/// A new block must not land on top of a confirmed stay in any room it covers.
/// Overlapping other blocks is fine.
pub(crate) fn check_block_admissible(
    ledger: &Ledger,
    scope: Scope,
    span: &DateSpan,
) -> Result<(), EngineError> {
    let clash = ledger
        .reservations()
        .filter(|r| r.holds_room() && scope.applies_to(r.room_id))
        .find(|r| r.stay.overlaps(span));
    match clash {
        Some(r) => Err(EngineError::Conflict(Holder::Reservation(r.id))),
        None => Ok(()),
    }
}
