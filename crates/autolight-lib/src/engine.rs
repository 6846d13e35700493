//! Schedule resolution engine.
//!
//! Decides, once per tick, which color should be live: the color of the
//! first schedule (in list order) active at the current time, or the
//! manual color when none is. Evaluations are throttled to one per second.

use std::fmt;

use chrono::{DateTime, TimeZone};

use crate::led::RgbColor;
use crate::state::DeviceState;

/// Minimum spacing between two evaluations, in milliseconds.
pub const EVALUATION_INTERVAL_MS: i64 = 1000;

/// Outcome of resolving the live color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No schedule active; the manual color controls the output.
    Manual(RgbColor),
    /// The schedule at `index` is active.
    Scheduled { index: usize, color: RgbColor },
}

impl Resolution {
    pub fn color(&self) -> RgbColor {
        match *self {
            Resolution::Manual(color) => color,
            Resolution::Scheduled { color, .. } => color,
        }
    }

    pub fn schedule_index(&self) -> Option<usize> {
        match *self {
            Resolution::Manual(_) => None,
            Resolution::Scheduled { index, .. } => Some(index),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Manual(color) => write!(f, "manual {color}"),
            Resolution::Scheduled { index, color } => write!(f, "schedule #{} {color}", index + 1),
        }
    }
}

/// Throttled resolver. Holds the last check time and the last resolution.
#[derive(Debug, Default)]
pub struct ScheduleEngine {
    last_check_ms: Option<i64>,
    last: Option<Resolution>,
}

impl ScheduleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the live color at `now`.
    ///
    /// Within [`EVALUATION_INTERVAL_MS`] of the previous evaluation the
    /// previous resolution is returned unchanged. If `now` is earlier than
    /// the previous check (the wall clock was stepped back) the check time is
    /// reset to `now` and evaluation proceeds.
    ///
    /// A schedule color is transient: the manual color in `state` is never
    /// overwritten, so the output falls back to it as soon as no schedule
    /// matches.
    pub fn evaluate<Tz: TimeZone>(&mut self, state: &DeviceState, now: &DateTime<Tz>) -> Resolution {
        let now_ms = now.timestamp_millis();
        if let (Some(last_ms), Some(last)) = (self.last_check_ms, self.last) {
            if now_ms < last_ms {
                log::debug!(
                    "[engine] clock moved back by {} ms, resetting check time",
                    last_ms - now_ms
                );
            } else if now_ms - last_ms < EVALUATION_INTERVAL_MS {
                return last;
            }
        }
        self.last_check_ms = Some(now_ms);

        let resolution = if state.schedules.is_empty() {
            Resolution::Manual(state.color)
        } else {
            match state.schedules.first_match(now) {
                Some((index, schedule)) => Resolution::Scheduled {
                    index,
                    color: schedule.color,
                },
                None => Resolution::Manual(state.color),
            }
        };
        log::trace!("[engine] t={} -> {resolution}", now.timestamp());
        self.last = Some(resolution);
        resolution
    }

    /// Drop the throttle state so the next `evaluate` runs in full.
    pub fn reset(&mut self) {
        self.last_check_ms = None;
        self.last = None;
    }

    /// Resolution produced by the most recent full evaluation.
    pub fn last_resolution(&self) -> Option<Resolution> {
        self.last
    }
}
