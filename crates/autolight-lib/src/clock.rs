//! Time sources for the tick loop.

use std::cell::RefCell;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeDelta, TimeZone};

use crate::error::{AutolightError, Result};

/// Source of the current wall-clock time, queried once per tick.
pub trait Clock {
    type Tz: TimeZone;

    fn now(&self) -> DateTime<Self::Tz>;
}

/// The system clock in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock for tests and dry runs.
#[derive(Debug)]
pub struct FixedClock<Tz: TimeZone> {
    now: RefCell<DateTime<Tz>>,
}

impl<Tz: TimeZone> FixedClock<Tz> {
    pub fn new(now: DateTime<Tz>) -> Self {
        FixedClock {
            now: RefCell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Tz>) {
        *self.now.borrow_mut() = now;
    }

    /// Move the clock by `delta` (negative moves it back).
    pub fn advance(&self, delta: TimeDelta) {
        let next = self.now.borrow().clone() + delta;
        self.set(next);
    }
}

impl<Tz: TimeZone> Clock for FixedClock<Tz> {
    type Tz = Tz;

    fn now(&self) -> DateTime<Tz> {
        self.now.borrow().clone()
    }
}

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a user-supplied instant.
///
/// Accepts epoch seconds, RFC 3339 (offset kept) and `YYYY-MM-DD HH:MM[:SS]`
/// in local time. A local time skipped by a DST change is an error; an
/// ambiguous one resolves to the earlier instant.
///
/// The returned offset is a snapshot. Convert to [`Local`] before resolving
/// recurring schedules so the zone's DST rules apply.
pub fn parse_instant(s: &str) -> Result<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .map(|utc| utc.with_timezone(&Local).fixed_offset())
            .ok_or_else(|| AutolightError::Time(format!("epoch {secs} out of range")));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    for fmt in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.fixed_offset())
                .ok_or_else(|| AutolightError::Time(format!("\"{s}\" does not exist in local time")));
        }
    }
    Err(AutolightError::Time(format!(
        "unrecognized time \"{s}\" (expected epoch seconds, RFC 3339 or YYYY-MM-DD HH:MM[:SS])"
    )))
}

/// Epoch seconds as local `YYYY-MM-DD HH:MM:SS`.
pub fn format_local(epoch: i64) -> String {
    match DateTime::from_timestamp(epoch, 0) {
        Some(utc) => utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("@{epoch}"),
    }
}
