//! Time Slot Module
//!
//! AMeDAS point series are published in 3-hour files; this module works out
//! which slot a point key refers to and whether it is still being filled.
//! Slot dates and hours are Japan Standard Time, whatever the host zone is.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};

/// Length of one point-data slot in hours.
pub const SLOT_HOURS: u32 = 3;

/// Offset of Japan Standard Time from UTC; AMeDAS file names use JST.
pub const JST_OFFSET_HOURS: i64 = 9;

/// Wall-clock time in JST for an instant.
pub fn to_jst(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.naive_utc() + Duration::hours(JST_OFFSET_HOURS)
}

/// Current wall-clock time in JST.
pub fn jst_now() -> NaiveDateTime {
    to_jst(Utc::now())
}

// == Time Slot Info ==
/// The 3-hour observation bucket a `point` key falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlotInfo {
    /// JST time the slot starts
    pub slot_start: NaiveDateTime,
    /// JST time the slot ends (start + 3h)
    pub slot_end: NaiveDateTime,
    /// Whether the slot is the most recent one as of `now`
    pub is_current: bool,
    /// Slot start hour: 0, 3, 6, ..., 21
    pub slot_hour: u32,
}

impl TimeSlotInfo {
    /// Parses a `YYYYMMDD_HH` discriminator relative to `now` (JST).
    ///
    /// Returns `None` when the date is invalid or `HH` is not a slot start hour.
    pub fn parse(discriminator: &str, now: NaiveDateTime) -> Option<Self> {
        let (date, hour) = discriminator.split_once('_')?;
        if date.len() != 8 || hour.len() != 2 {
            return None;
        }
        if !date.bytes().chain(hour.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        let date = NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;
        let slot_hour: u32 = hour.parse().ok()?;
        if slot_hour >= 24 || slot_hour % SLOT_HOURS != 0 {
            return None;
        }

        let slot_start = date.and_hms_opt(slot_hour, 0, 0)?;
        let slot_end = slot_start + Duration::hours(i64::from(SLOT_HOURS));
        let is_current = date == now.date() && slot_hour == current_slot_hour(now);

        Some(Self {
            slot_start,
            slot_end,
            is_current,
            slot_hour,
        })
    }
}

/// Start hour of the slot containing `now`.
pub fn current_slot_hour(now: NaiveDateTime) -> u32 {
    now.hour() / SLOT_HOURS * SLOT_HOURS
}
