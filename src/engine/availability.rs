use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

// ── Availability projection ───────────────────────────────────────
//
// Windows are short (see `MAX_QUERY_WINDOW_DAYS`), so holds are expanded into
// per-room sets of calendar days rather than kept as intervals. O(days × rooms).

/// Per-room set of days that are not bookable.
pub type BlockedDays = BTreeMap<Ulid, BTreeSet<NaiveDate>>;

/// Expand blocks and confirmed reservations intersecting `window` into blocked
/// days for each room in `room_ids`. Property-wide blocks fan out to every
/// listed room; holds on rooms not listed are ignored.
pub fn blocked_days<'a>(
    room_ids: &[Ulid],
    blocks: impl IntoIterator<Item = &'a AvailabilityBlock>,
    reservations: impl IntoIterator<Item = &'a Reservation>,
    window: &DateSpan,
) -> BlockedDays {
    let mut blocked: BlockedDays = room_ids.iter().map(|id| (*id, BTreeSet::new())).collect();

    for block in blocks {
        let Some(clamped) = block.span.clamp_to(window) else {
            continue;
        };
        match block.scope {
            Scope::Room(room_id) => {
                if let Some(days) = blocked.get_mut(&room_id) {
                    days.extend(clamped.days());
                }
            }
            Scope::PropertyWide => {
                for days in blocked.values_mut() {
                    days.extend(clamped.days());
                }
            }
        }
    }

    for reservation in reservations.into_iter().filter(|r| r.holds_room()) {
        let Some(clamped) = reservation.stay.clamp_to(window) else {
            continue;
        };
        if let Some(days) = blocked.get_mut(&reservation.room_id) {
            days.extend(clamped.days());
        }
    }

    blocked
}

/// Days of `window` on which every room is blocked. With no rooms at all the
/// whole window is unavailable.
pub fn fully_booked_days(blocked: &BlockedDays, window: &DateSpan) -> Vec<NaiveDate> {
    window
        .days()
        .filter(|day| blocked.values().all(|days| days.contains(day)))
        .collect()
}

/// True iff no day of `span` is blocked.
pub fn is_free(blocked: &BTreeSet<NaiveDate>, span: &DateSpan) -> bool {
    blocked.range(span.start..span.end).next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::parse_date_only;

    fn d(s: &str) -> NaiveDate {
        parse_date_only(s).unwrap()
    }

    fn span(a: &str, b: &str) -> DateSpan {
        DateSpan::new(d(a), d(b))
    }

    fn block(scope: Scope, a: &str, b: &str) -> AvailabilityBlock {
        AvailabilityBlock {
            id: Ulid::new(),
            property_id: Ulid::nil(),
            scope,
            span: span(a, b),
            reason: None,
            created_at: 0,
        }
    }

    fn reservation(room_id: Ulid, a: &str, b: &str, status: ReservationStatus) -> Reservation {
        Reservation {
            id: Ulid::new(),
            property_id: Ulid::nil(),
            room_id,
            stay: span(a, b),
            status,
            source: ReservationSource::Direct,
            guest: GuestInfo {
                name: "Guest".into(),
                email: "guest@example.com".into(),
                phone: None,
                count: None,
                message: None,
            },
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn no_rooms_means_nothing_is_available() {
        let window = span("2025-07-01", "2025-07-04");
        let blocked = blocked_days(&[], [], [], &window);
        assert_eq!(
            fully_booked_days(&blocked, &window),
            vec![d("2025-07-01"), d("2025-07-02"), d("2025-07-03")]
        );
    }

    #[test]
    fn one_free_room_keeps_the_property_open() {
        let (y, z) = (Ulid::new(), Ulid::new());
        let window = span("2025-07-01", "2025-08-01");
        let blocks = [block(Scope::Room(y), "2025-07-10", "2025-07-12")];
        let blocked = blocked_days(&[y, z], &blocks, [], &window);

        assert!(fully_booked_days(&blocked, &window).is_empty());
        let y_days: Vec<_> = blocked[&y].iter().copied().collect();
        assert_eq!(y_days, vec![d("2025-07-10"), d("2025-07-11")]);
        assert!(blocked[&z].is_empty());
    }

    #[test]
    fn property_wide_block_fans_out() {
        let (y, z) = (Ulid::new(), Ulid::new());
        let window = span("2025-07-01", "2025-07-31");
        let blocks = [block(Scope::PropertyWide, "2025-07-20", "2025-07-22")];
        let blocked = blocked_days(&[y, z], &blocks, [], &window);
        assert_eq!(
            fully_booked_days(&blocked, &window),
            vec![d("2025-07-20"), d("2025-07-21")]
        );
    }

    #[test]
    fn only_confirmed_reservations_block() {
        let room = Ulid::new();
        let window = span("2025-06-01", "2025-06-30");
        let reservations = [
            reservation(room, "2025-06-01", "2025-06-03", ReservationStatus::Confirmed),
            reservation(room, "2025-06-10", "2025-06-12", ReservationStatus::Pending),
            reservation(room, "2025-06-20", "2025-06-22", ReservationStatus::Cancelled),
        ];
        let blocked = blocked_days(&[room], [], &reservations, &window);
        assert_eq!(
            fully_booked_days(&blocked, &window),
            vec![d("2025-06-01"), d("2025-06-02")]
        );
    }

    #[test]
    fn holds_are_clamped_to_window() {
        let room = Ulid::new();
        let window = span("2025-07-01", "2025-07-05");
        let reservations = [reservation(room, "2025-06-25", "2025-07-02", ReservationStatus::Confirmed)];
        let blocks = [block(Scope::Room(room), "2025-07-04", "2025-09-01")];
        let blocked = blocked_days(&[room], &blocks, &reservations, &window);
        let days: Vec<_> = blocked[&room].iter().copied().collect();
        assert_eq!(days, vec![d("2025-07-01"), d("2025-07-04")]);
    }

    #[test]
    fn holds_on_unlisted_rooms_are_ignored() {
        let (listed, inactive) = (Ulid::new(), Ulid::new());
        let window = span("2025-07-01", "2025-07-03");
        let blocks = [block(Scope::Room(inactive), "2025-07-01", "2025-07-03")];
        let blocked = blocked_days(&[listed], &blocks, [], &window);
        assert_eq!(blocked.len(), 1);
        assert!(blocked[&listed].is_empty());
    }

    #[test]
    fn free_check_is_half_open() {
        let mut blocked = BTreeSet::new();
        blocked.insert(d("2025-06-05"));
        assert!(is_free(&blocked, &span("2025-06-01", "2025-06-05")));
        assert!(!is_free(&blocked, &span("2025-06-04", "2025-06-06")));
        assert!(is_free(&blocked, &span("2025-06-06", "2025-06-08")));
    }
}
