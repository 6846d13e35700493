//! Schedules: time windows that override the manual color.
//!
//! A [`Schedule`] is active for a closed interval `[start, end]` of epoch
//! seconds. A recurring schedule (non-empty [`DaySet`]) is additionally
//! limited to its weekdays and to the time-of-day span between its start and
//! end clock times, so a single entry can cover the same hours every day.

use std::fmt;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Weekday};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::led::RgbColor;

/// Upper bound on schedules held by one device.
pub const MAX_SCHEDULES: usize = 16;

// ── Day sets ──

/// Weekday bitmask. Monday is bit 0, Sunday bit 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DaySet(u8);

static DAY_NAMES: [(&str, &str, Weekday); 7] = [
    ("Monday", "mon", Weekday::Mon),
    ("Tuesday", "tue", Weekday::Tue),
    ("Wednesday", "wed", Weekday::Wed),
    ("Thursday", "thu", Weekday::Thu),
    ("Friday", "fri", Weekday::Fri),
    ("Saturday", "sat", Weekday::Sat),
    ("Sunday", "sun", Weekday::Sun),
];

impl DaySet {
    pub const NONE: DaySet = DaySet(0x00);
    pub const WEEKDAYS: DaySet = DaySet(0x1F);
    pub const WEEKEND: DaySet = DaySet(0x60);
    pub const ALL: DaySet = DaySet(0x7F);

    pub fn single(day: Weekday) -> Self {
        DaySet(1 << day.num_days_from_monday())
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::single(day).0 != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::single(day).0;
    }

    pub fn union(self, other: DaySet) -> DaySet {
        DaySet(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Days in Monday-first order.
    pub fn days(self) -> impl Iterator<Item = Weekday> {
        DAY_NAMES
            .iter()
            .map(|(_, _, d)| *d)
            .filter(move |d| self.contains(*d))
    }

    /// Look up one day name: full (`"Monday"`) or short (`"mon"`), any case.
    pub fn day_from_name(name: &str) -> Option<Weekday> {
        let name = name.trim();
        DAY_NAMES
            .iter()
            .find(|(full, short, _)| {
                name.eq_ignore_ascii_case(full) || name.eq_ignore_ascii_case(short)
            })
            .map(|(_, _, d)| *d)
    }

    /// Parse a day specification.
    ///
    /// Accepts day names, `all`, `daily`, `weekdays`, `weekend`, `none`, and
    /// comma-separated combinations (`"mon,wed,fri"`, `"weekend,mon"`).
    pub fn parse(s: &str) -> Result<DaySet, String> {
        let mut set = DaySet::NONE;
        for part in s.split(',') {
            let part = part.trim();
            let next = match part.to_lowercase().as_str() {
                "" | "none" => DaySet::NONE,
                "all" | "daily" => DaySet::ALL,
                "weekdays" => DaySet::WEEKDAYS,
                "weekend" => DaySet::WEEKEND,
                _ => match Self::day_from_name(part) {
                    Some(day) => DaySet::single(day),
                    None => return Err(format!("unknown day {part:?}")),
                },
            };
            set = set.union(next);
        }
        Ok(set)
    }

    fn full_name(day: Weekday) -> &'static str {
        DAY_NAMES[day.num_days_from_monday() as usize].0
    }
}

impl fmt::Display for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DaySet::NONE => f.write_str("once"),
            DaySet::ALL => f.write_str("daily"),
            DaySet::WEEKDAYS => f.write_str("weekdays"),
            DaySet::WEEKEND => f.write_str("weekend"),
            set => {
                let names: Vec<&str> = set.days().map(|d| &Self::full_name(d)[..3]).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

impl Serialize for DaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.count_ones() as usize))?;
        for day in self.days() {
            seq.serialize_element(Self::full_name(day))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for DaySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DaySetVisitor;

        impl<'de> Visitor<'de> for DaySetVisitor {
            type Value = DaySet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a list of weekday names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<DaySet, A::Error> {
                let mut set = DaySet::NONE;
                while let Some(name) = seq.next_element::<String>()? {
                    let day = DaySet::day_from_name(&name).ok_or_else(|| {
                        de::Error::invalid_value(de::Unexpected::Str(&name), &self)
                    })?;
                    set.insert(day);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(DaySetVisitor)
    }
}

// ── Schedules ──

/// A time window with a target color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Window start, epoch seconds (inclusive).
    pub start: i64,
    /// Window end, epoch seconds (inclusive).
    pub end: i64,
    pub color: RgbColor,
    /// Recurrence days. Empty = one-shot window.
    #[serde(default, rename = "daysActive", skip_serializing_if = "DaySet::is_empty")]
    pub days: DaySet,
}

impl Schedule {
    pub fn new(start: i64, end: i64, color: RgbColor) -> Self {
        Schedule {
            start,
            end,
            color,
            days: DaySet::NONE,
        }
    }

    pub fn with_days(mut self, days: DaySet) -> Self {
        self.days = days;
        self
    }

    pub fn is_recurring(&self) -> bool {
        !self.days.is_empty()
    }

    /// Whether the schedule is active at `now`.
    ///
    /// `now` must fall inside `[start, end]`. For recurring schedules today's
    /// weekday must be in the day set and the local time of day must fall
    /// inside the span from the start's clock time to the end's clock time,
    /// both projected into the timezone of `now`. A span whose start clock
    /// time is later than its end clock time wraps past midnight.
    ///
    /// The weekday test always uses the day `now` falls on. For a wrapping
    /// span the tail after midnight therefore belongs to the following day:
    /// a Friday-only 22:00-06:00 schedule is lit Friday 22:00 to midnight and
    /// Friday 00:00 to 06:00, but not Saturday 00:00 to 06:00.
    ///
    /// A recurring schedule never fires after `end`, even if the day set and
    /// time of day would otherwise match.
    pub fn contains<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let ts = now.timestamp();
        if ts < self.start || ts > self.end {
            return false;
        }
        if !self.is_recurring() {
            return true;
        }
        if !self.days.contains(now.weekday()) {
            return false;
        }
        let tz = now.timezone();
        let (Some(start), Some(end)) = (
            seconds_from_midnight(self.start, &tz),
            seconds_from_midnight(self.end, &tz),
        ) else {
            return false;
        };
        let t = now.num_seconds_from_midnight();
        if start <= end {
            start <= t && t <= end
        } else {
            t >= start || t <= end
        }
    }
}

fn seconds_from_midnight<Tz: TimeZone>(epoch: i64, tz: &Tz) -> Option<u32> {
    DateTime::from_timestamp(epoch, 0).map(|utc| utc.with_timezone(tz).num_seconds_from_midnight())
}

/// Ordered list of schedules. List order is priority order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Schedule>", into = "Vec<Schedule>")]
pub struct ScheduleSet {
    schedules: Vec<Schedule>,
}

impl TryFrom<Vec<Schedule>> for ScheduleSet {
    type Error = String;

    fn try_from(schedules: Vec<Schedule>) -> Result<Self, String> {
        if schedules.len() > MAX_SCHEDULES {
            return Err(format!(
                "{} schedules given, at most {MAX_SCHEDULES} supported",
                schedules.len()
            ));
        }
        if let Some((i, s)) = schedules.iter().enumerate().find(|(_, s)| s.start > s.end) {
            return Err(format!(
                "schedule {i} ends ({}) before it starts ({})",
                s.end, s.start
            ));
        }
        Ok(ScheduleSet { schedules })
    }
}

impl From<ScheduleSet> for Vec<Schedule> {
    fn from(set: ScheduleSet) -> Self {
        set.schedules
    }
}

impl ScheduleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Schedule> {
        self.schedules.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Schedule> {
        self.schedules.iter()
    }

    pub fn as_slice(&self) -> &[Schedule] {
        &self.schedules
    }

    /// First schedule in list order that is active at `now`.
    pub fn first_match<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<(usize, &Schedule)> {
        self.schedules
            .iter()
            .enumerate()
            .find(|(_, s)| s.contains(now))
    }
}

impl<'a> IntoIterator for &'a ScheduleSet {
    type Item = &'a Schedule;
    type IntoIter = std::slice::Iter<'a, Schedule>;

    fn into_iter(self) -> Self::IntoIter {
        self.schedules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    const RED: RgbColor = RgbColor::new(255, 0, 0);

    /// 2024-01-01 was a Monday.
    fn utc(day: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, h, m, s).unwrap()
    }

    fn ts(day: u32, h: u32, m: u32, s: u32) -> i64 {
        utc(day, h, m, s).timestamp()
    }

    // ── DaySet ──

    #[test]
    fn dayset_constants() {
        assert_eq!(DaySet::ALL.days().count(), 7);
        assert_eq!(DaySet::WEEKDAYS.days().count(), 5);
        assert!(DaySet::WEEKEND.contains(Weekday::Sat));
        assert!(DaySet::WEEKEND.contains(Weekday::Sun));
        assert!(!DaySet::WEEKEND.contains(Weekday::Mon));
        assert_eq!(DaySet::WEEKDAYS.union(DaySet::WEEKEND), DaySet::ALL);
    }

    #[test]
    fn dayset_parse_names_and_groups() {
        assert_eq!(DaySet::parse("all").unwrap(), DaySet::ALL);
        assert_eq!(DaySet::parse("weekdays").unwrap(), DaySet::WEEKDAYS);
        let set = DaySet::parse("mon, Wednesday ,FRI").unwrap();
        assert_eq!(
            set.days().collect::<Vec<_>>(),
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
        assert_eq!(DaySet::parse("weekend,mon").unwrap().days().count(), 3);
        assert_eq!(DaySet::parse("none").unwrap(), DaySet::NONE);
    }

    #[test]
    fn dayset_parse_unknown_is_error() {
        let err = DaySet::parse("mon,funday").unwrap_err();
        assert!(err.contains("funday"), "got: {err}");
    }

    #[test]
    fn dayset_display() {
        assert_eq!(DaySet::ALL.to_string(), "daily");
        assert_eq!(DaySet::NONE.to_string(), "once");
        assert_eq!(DaySet::parse("mon,sun").unwrap().to_string(), "Mon,Sun");
    }

    #[test]
    fn dayset_serializes_as_full_names() {
        let set = DaySet::parse("sun,mon").unwrap();
        let json = serde_json::to_value(set).unwrap();
        assert_eq!(json, serde_json::json!(["Monday", "Sunday"]));
        let back: DaySet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn dayset_deserialize_rejects_unknown_name() {
        let result: Result<DaySet, _> = serde_json::from_str(r#"["Monday","Caturday"]"#);
        assert!(result.is_err());
    }

    // ── one-shot windows ──

    #[test]
    fn one_shot_closed_interval() {
        let s = Schedule::new(ts(1, 8, 0, 0), ts(1, 9, 0, 0), RED);
        assert!(s.contains(&utc(1, 8, 0, 0)), "start is inclusive");
        assert!(s.contains(&utc(1, 8, 30, 0)));
        assert!(s.contains(&utc(1, 9, 0, 0)), "end is inclusive");
        assert!(!s.contains(&utc(1, 7, 59, 59)));
        assert!(!s.contains(&utc(1, 9, 0, 1)));
    }

    #[test]
    fn degenerate_single_instant() {
        let s = Schedule::new(ts(1, 8, 0, 0), ts(1, 8, 0, 0), RED);
        assert!(s.contains(&utc(1, 8, 0, 0)));
        assert!(!s.contains(&utc(1, 8, 0, 1)));
    }

    // ── recurring windows ──

    #[test]
    fn recurring_matches_same_hours_on_later_days() {
        // Window spans the whole month, daily 08:00-09:00.
        let s = Schedule::new(ts(1, 8, 0, 0), ts(31, 9, 0, 0), RED).with_days(DaySet::ALL);
        assert!(s.contains(&utc(15, 8, 30, 0)));
        assert!(!s.contains(&utc(15, 12, 0, 0)));
    }

    #[test]
    fn recurring_respects_weekday() {
        let s = Schedule::new(ts(1, 8, 0, 0), ts(31, 9, 0, 0), RED).with_days(DaySet::WEEKDAYS);
        // Jan 6 2024 is a Saturday, Jan 8 a Monday.
        assert!(!s.contains(&utc(6, 8, 30, 0)));
        assert!(s.contains(&utc(8, 8, 30, 0)));
    }

    #[test]
    fn recurring_still_bounded_by_absolute_window() {
        let s = Schedule::new(ts(1, 8, 0, 0), ts(5, 9, 0, 0), RED).with_days(DaySet::ALL);
        assert!(!s.contains(&utc(10, 8, 30, 0)));
    }

    #[test]
    fn recurring_window_wraps_midnight() {
        let s = Schedule::new(ts(1, 22, 0, 0), ts(31, 6, 0, 0), RED).with_days(DaySet::ALL);
        assert!(s.contains(&utc(10, 23, 0, 0)));
        assert!(s.contains(&utc(11, 5, 59, 59)));
        assert!(!s.contains(&utc(11, 12, 0, 0)));
    }

    #[test]
    fn wrapped_tail_checks_the_day_it_falls_on() {
        // Jan 4 2024 is a Thursday, Jan 5 a Friday, Jan 6 a Saturday.
        let fri = DaySet::single(Weekday::Fri);
        let s = Schedule::new(ts(1, 22, 0, 0), ts(31, 6, 0, 0), RED).with_days(fri);
        assert!(s.contains(&utc(5, 23, 0, 0)), "Friday evening");
        assert!(s.contains(&utc(5, 2, 0, 0)), "Friday early morning");
        assert!(!s.contains(&utc(6, 2, 0, 0)), "Saturday early morning");
        assert!(!s.contains(&utc(4, 23, 0, 0)), "Thursday evening");
    }

    #[test]
    fn recurring_projection_uses_local_offset() {
        // 08:00-09:00 at UTC+2 is 06:00-07:00 UTC.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let start = tz.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap().timestamp();
        let end = tz.with_ymd_and_hms(2024, 1, 31, 9, 0, 0).unwrap().timestamp();
        let s = Schedule::new(start, end, RED).with_days(DaySet::ALL);

        let local_830 = tz.with_ymd_and_hms(2024, 1, 10, 8, 30, 0).unwrap();
        assert!(s.contains(&local_830));
        let local_1030 = tz.with_ymd_and_hms(2024, 1, 10, 10, 30, 0).unwrap();
        assert!(!s.contains(&local_1030));
    }

    // ── ScheduleSet ──

    #[test]
    fn first_match_uses_list_order() {
        let set = ScheduleSet::try_from(vec![
            Schedule::new(ts(1, 8, 0, 0), ts(1, 9, 0, 0), RED),
            Schedule::new(ts(1, 8, 30, 0), ts(1, 10, 0, 0), RgbColor::new(0, 0, 255)),
        ])
        .unwrap();
        let (i, s) = set.first_match(&utc(1, 8, 45, 0)).unwrap();
        assert_eq!(i, 0);
        assert_eq!(s.color, RED);
        let (i, _) = set.first_match(&utc(1, 9, 30, 0)).unwrap();
        assert_eq!(i, 1);
        assert!(set.first_match(&utc(1, 11, 0, 0)).is_none());
    }

    #[test]
    fn set_rejects_inverted_window() {
        let err = ScheduleSet::try_from(vec![Schedule::new(10, 5, RED)]).unwrap_err();
        assert!(err.contains("before it starts"), "got: {err}");
    }

    #[test]
    fn set_rejects_too_many() {
        let many = vec![Schedule::new(0, 1, RED); MAX_SCHEDULES + 1];
        assert!(ScheduleSet::try_from(many).is_err());
    }

    #[test]
    fn set_equality_is_structural_and_ordered() {
        let a = Schedule::new(0, 10, RED);
        let b = Schedule::new(20, 30, RED);
        let ab = ScheduleSet::try_from(vec![a.clone(), b.clone()]).unwrap();
        let ab2 = ScheduleSet::try_from(vec![a.clone(), b.clone()]).unwrap();
        let ba = ScheduleSet::try_from(vec![b, a]).unwrap();
        assert_eq!(ab, ab2);
        assert_ne!(ab, ba);
    }

    #[test]
    fn schedule_document_omits_empty_days() {
        let json = serde_json::to_value(Schedule::new(1, 2, RED)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"start": 1, "end": 2, "color": {"r": 255, "g": 0, "b": 0}})
        );
    }
}
