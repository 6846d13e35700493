//! Update validation: turns an untrusted document into typed fields.
//!
//! Each top-level section (`pins`, `color`, `schedules`) is optional. A
//! malformed section or schedule entry is rejected on its own and logged;
//! the rest of the document is still accepted.

use std::fmt;

use serde_json::{Map, Value};

use crate::AutolightError;
use crate::led::{PinAssignment, RgbColor};
use crate::schedule::{DaySet, MAX_SCHEDULES, Schedule, ScheduleSet};

/// One part of an update that was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Document path of the rejected part, e.g. `"pins"` or `"schedules[2]"`.
    pub field: String,
    pub reason: String,
}

impl Rejection {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Rejection {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Typed result of validating an update document.
///
/// `None` means the section was absent or rejected; the current value stays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedUpdate {
    pub pins: Option<PinAssignment>,
    pub color: Option<RgbColor>,
    pub schedules: Option<ScheduleSet>,
    pub rejected: Vec<Rejection>,
}

/// Validate an incoming update document.
///
/// Returns `Err(Document)` only when the document is not a JSON object.
pub fn validate_update(doc: &Value) -> crate::error::Result<ValidatedUpdate> {
    let Some(root) = doc.as_object() else {
        return Err(AutolightError::Document(format!(
            "expected an object, got {}",
            kind(doc)
        )));
    };

    let mut update = ValidatedUpdate::default();

    match present(root, "pins") {
        None => {}
        Some(v) => match parse_pins(v) {
            Ok(pins) => update.pins = Some(pins),
            Err(reason) => update.rejected.push(Rejection::new("pins", reason)),
        },
    }

    match present(root, "color") {
        None => {}
        Some(v) => match parse_color(v) {
            Ok(color) => update.color = Some(color),
            Err(reason) => update.rejected.push(Rejection::new("color", reason)),
        },
    }

    match present(root, "schedules") {
        None => {}
        Some(Value::Array(entries)) => {
            let mut accepted = Vec::with_capacity(entries.len().min(MAX_SCHEDULES));
            for (i, entry) in entries.iter().enumerate() {
                let field = format!("schedules[{i}]");
                if accepted.len() == MAX_SCHEDULES {
                    update.rejected.push(Rejection::new(
                        field,
                        format!("more than {MAX_SCHEDULES} schedules"),
                    ));
                    continue;
                }
                match parse_schedule(entry) {
                    Ok(s) => accepted.push(s),
                    Err(reason) => update.rejected.push(Rejection::new(field, reason)),
                }
            }
            // Every entry satisfies the set invariants after filtering.
            match ScheduleSet::try_from(accepted) {
                Ok(set) => update.schedules = Some(set),
                Err(reason) => update.rejected.push(Rejection::new("schedules", reason)),
            }
        }
        Some(other) => update.rejected.push(Rejection::new(
            "schedules",
            format!("expected an array, got {}", kind(other)),
        )),
    }

    for r in &update.rejected {
        log::warn!("[update] rejected {r}");
    }
    Ok(update)
}

/// A key that is present and not `null`.
fn present<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    root.get(key).filter(|v| !v.is_null())
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Integer from a JSON number (fractions truncated) or a decimal string.
fn as_integer(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_color(v: &Value) -> Result<RgbColor, String> {
    let Some(obj) = v.as_object() else {
        return Err(format!("expected an object, got {}", kind(v)));
    };
    let channel = |name: &str| -> Result<i64, String> {
        match present(obj, name) {
            None => Ok(0),
            Some(c) => as_integer(c).ok_or_else(|| format!("channel {name} is not a number")),
        }
    };
    Ok(RgbColor::from_untrusted(
        channel("r")?,
        channel("g")?,
        channel("b")?,
    ))
}

fn parse_pins(v: &Value) -> Result<PinAssignment, String> {
    let Some(obj) = v.as_object() else {
        return Err(format!("expected an object, got {}", kind(v)));
    };
    let pin = |name: &str| -> Result<u8, String> {
        let raw = present(obj, name).ok_or_else(|| format!("pin {name} is missing"))?;
        let n = as_integer(raw).ok_or_else(|| format!("pin {name} is not a number"))?;
        u8::try_from(n).map_err(|_| format!("pin {name} = {n} is out of range (0-255)"))
    };
    let pins = PinAssignment::new(pin("r")?, pin("g")?, pin("b")?);
    if pins.has_collision() {
        return Err(format!("pins must be distinct ({pins})"));
    }
    Ok(pins)
}

fn parse_schedule(v: &Value) -> Result<Schedule, String> {
    let Some(obj) = v.as_object() else {
        return Err(format!("expected an object, got {}", kind(v)));
    };
    let color = match present(obj, "color") {
        None => return Err("color is missing".into()),
        Some(c) => parse_color(c).map_err(|e| format!("color: {e}"))?,
    };
    let time = |name: &str| -> Result<i64, String> {
        let raw = present(obj, name).ok_or_else(|| format!("{name} is missing"))?;
        as_integer(raw).ok_or_else(|| format!("{name} is not an epoch timestamp"))
    };
    let start = time("start")?;
    let end = time("end")?;
    if start > end {
        return Err(format!("end ({end}) is before start ({start})"));
    }
    let days = match present(obj, "daysActive") {
        None => DaySet::NONE,
        Some(Value::Array(names)) => {
            let mut set = DaySet::NONE;
            for name in names {
                let day = name
                    .as_str()
                    .and_then(DaySet::day_from_name)
                    .ok_or_else(|| format!("unknown day {name}"))?;
                set.insert(day);
            }
            set
        }
        Some(other) => {
            return Err(format!("daysActive: expected an array, got {}", kind(other)));
        }
    };
    Ok(Schedule::new(start, end, color).with_days(days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn red() -> Value {
        json!({"r": 255, "g": 0, "b": 0})
    }

    #[test]
    fn non_object_document_is_error() {
        let err = validate_update(&json!([1, 2, 3])).unwrap_err();
        assert!(err.to_string().contains("an array"), "got: {err}");
    }

    #[test]
    fn empty_document_changes_nothing() {
        let u = validate_update(&json!({})).unwrap();
        assert_eq!(u, ValidatedUpdate::default());
    }

    #[test]
    fn full_valid_document() {
        let u = validate_update(&json!({
            "pins": {"r": 1, "g": 2, "b": 3},
            "color": {"r": 4, "g": 5, "b": 6},
            "schedules": [{"start": 10, "end": 20, "color": red()}]
        }))
        .unwrap();
        assert_eq!(u.pins, Some(PinAssignment::new(1, 2, 3)));
        assert_eq!(u.color, Some(RgbColor::new(4, 5, 6)));
        assert_eq!(u.schedules.unwrap().len(), 1);
        assert!(u.rejected.is_empty());
    }

    #[test]
    fn malformed_entry_dropped_valid_entry_kept() {
        let u = validate_update(&json!({
            "schedules": [
                {"start": 10, "end": 20},
                {"start": 30, "end": 40, "color": red()}
            ]
        }))
        .unwrap();
        let set = u.schedules.unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(0).unwrap().start, 30);
        assert_eq!(u.rejected.len(), 1);
        assert_eq!(u.rejected[0].field, "schedules[0]");
        assert!(u.rejected[0].reason.contains("color"));
    }

    #[test]
    fn missing_channel_defaults_to_zero() {
        let u = validate_update(&json!({
            "schedules": [{"start": 1, "end": 2, "color": {"g": 7}}]
        }))
        .unwrap();
        let set = u.schedules.unwrap();
        assert_eq!(set.get(0).unwrap().color, RgbColor::new(0, 7, 0));
    }

    #[test]
    fn channels_are_clamped() {
        let u = validate_update(&json!({"color": {"r": -20, "g": 999, "b": 12.9}})).unwrap();
        assert_eq!(u.color, Some(RgbColor::new(0, 255, 12)));
    }

    #[test]
    fn non_numeric_channel_rejects_color() {
        let u = validate_update(&json!({"color": {"r": "bright"}})).unwrap();
        assert!(u.color.is_none());
        assert_eq!(u.rejected[0].field, "color");
    }

    #[test]
    fn missing_or_bad_times_are_rejected() {
        let u = validate_update(&json!({
            "schedules": [
                {"end": 20, "color": red()},
                {"start": "soon", "end": 20, "color": red()},
                {"start": "15", "end": " 20 ", "color": red()}
            ]
        }))
        .unwrap();
        let set = u.schedules.unwrap();
        assert_eq!(set.len(), 1, "numeric strings are parseable");
        assert_eq!(set.get(0).unwrap().start, 15);
        assert_eq!(u.rejected.len(), 2);
        assert!(u.rejected[0].reason.contains("start is missing"));
        assert!(u.rejected[1].reason.contains("not an epoch"));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let u = validate_update(&json!({
            "schedules": [{"start": 50, "end": 40, "color": red()}]
        }))
        .unwrap();
        assert!(u.schedules.unwrap().is_empty());
        assert!(u.rejected[0].reason.contains("before start"));
    }

    #[test]
    fn days_active_parsed() {
        let u = validate_update(&json!({
            "schedules": [{"start": 1, "end": 2, "color": red(), "daysActive": ["Monday", "fri"]}]
        }))
        .unwrap();
        let set = u.schedules.unwrap();
        let days = set.get(0).unwrap().days;
        assert!(days.contains(chrono::Weekday::Mon));
        assert!(days.contains(chrono::Weekday::Fri));
        assert_eq!(days.days().count(), 2);
    }

    #[test]
    fn unknown_day_rejects_entry() {
        let u = validate_update(&json!({
            "schedules": [{"start": 1, "end": 2, "color": red(), "daysActive": ["Someday"]}]
        }))
        .unwrap();
        assert!(u.schedules.unwrap().is_empty());
        assert!(u.rejected[0].reason.contains("unknown day"));
    }

    #[test]
    fn excess_schedules_rejected() {
        let entries: Vec<Value> = (0..MAX_SCHEDULES + 2)
            .map(|i| json!({"start": i, "end": i + 1, "color": red()}))
            .collect();
        let u = validate_update(&json!({ "schedules": entries })).unwrap();
        assert_eq!(u.schedules.unwrap().len(), MAX_SCHEDULES);
        assert_eq!(u.rejected.len(), 2);
    }

    #[test]
    fn schedules_not_array_keeps_current() {
        let u = validate_update(&json!({"schedules": {"start": 1}})).unwrap();
        assert!(u.schedules.is_none());
        assert_eq!(u.rejected[0].field, "schedules");
    }

    #[test]
    fn null_sections_are_absent() {
        let u = validate_update(&json!({"pins": null, "color": null, "schedules": null})).unwrap();
        assert_eq!(u, ValidatedUpdate::default());
    }

    #[test]
    fn colliding_pins_rejected() {
        let u = validate_update(&json!({"pins": {"r": 5, "g": 5, "b": 6}})).unwrap();
        assert!(u.pins.is_none());
        assert!(u.rejected[0].reason.contains("distinct"));
    }

    #[test]
    fn pin_out_of_range_or_missing_rejected() {
        let u = validate_update(&json!({"pins": {"r": 300, "g": 1, "b": 2}})).unwrap();
        assert!(u.pins.is_none());
        assert!(u.rejected[0].reason.contains("out of range"));

        let u = validate_update(&json!({"pins": {"r": 1, "g": 2}})).unwrap();
        assert!(u.rejected[0].reason.contains("pin b is missing"));
    }

    #[test]
    fn rejection_display() {
        let r = Rejection::new("schedules[3]", "color is missing");
        assert_eq!(r.to_string(), "schedules[3]: color is missing");
    }
}
