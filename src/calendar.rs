//! Date-only calendar arithmetic.
//!
//! Every date in the system is a `NaiveDate`: no time component, no zone, so all
//! comparisons are UTC calendar days by construction.

use chrono::{Datelike, Days, NaiveDate};

/// Parse a strict `YYYY-MM-DD` literal. Rolled-over dates such as `2024-02-30`
/// are rejected rather than normalized into the next month.
pub fn parse_date_only(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }

    let year: i32 = text[0..4].parse().ok()?;
    let month: u32 = text[5..7].parse().ok()?;
    let day: u32 = text[8..10].parse().ok()?;
    if year == 0 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn format_date_only(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Zero-night stays are invalid.
pub fn is_valid_date_range(start: NaiveDate, end: NaiveDate) -> bool {
    start < end
}

/// Half-open overlap. Touching ranges (`end_a == start_b`) do not overlap, which
/// is what allows same-day turnover.
pub fn ranges_overlap(
    start_a: NaiveDate,
    end_a: NaiveDate,
    start_b: NaiveDate,
    end_b: NaiveDate,
) -> bool {
    start_a < end_b && start_b < end_a
}

pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    }
}

pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    let first = start_of_month(date);
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    match next {
        Some(next) => next.signed_duration_since(first).num_days() as u32,
        // Only reachable at NaiveDate::MAX; December has 31 days.
        None => 31,
    }
}

/// Iterate the calendar days of `[start, end)`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    std::iter::successors(Some(start), |d| d.succ_opt()).take_while(move |d| *d < end)
}
