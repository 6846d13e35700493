//! Device state: the single persisted and exchanged root value.

use serde::{Deserialize, Serialize};

use crate::led::{PinAssignment, RgbColor};
use crate::schedule::ScheduleSet;
use crate::validate::ValidatedUpdate;

/// Pins, manual color and schedules of one light.
///
/// Document form:
/// `{"pins":{"r","g","b"},"color":{"r","g","b"},"schedules":[{"start","end","color"}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    pub pins: PinAssignment,
    /// Manual color, shown whenever no schedule is active.
    #[serde(default)]
    pub color: RgbColor,
    #[serde(default)]
    pub schedules: ScheduleSet,
}

/// Whether an update modified the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    Changed,
    Unchanged,
}

impl DeviceState {
    /// Serialize to the exchange document.
    pub fn to_document(&self) -> serde_json::Value {
        // DeviceState contains only maps, integers and strings.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Merge a validated update. Fields the update leaves out are kept.
    ///
    /// The schedule set is replaced wholesale, and only when it differs
    /// structurally from the current one.
    pub fn merge(&mut self, update: ValidatedUpdate) -> UpdateResult {
        let mut result = UpdateResult::Unchanged;
        if let Some(pins) = update.pins
            && pins != self.pins
        {
            self.pins = pins;
            result = UpdateResult::Changed;
        }
        if let Some(color) = update.color
            && color != self.color
        {
            self.color = color;
            result = UpdateResult::Changed;
        }
        if let Some(schedules) = update.schedules
            && schedules != self.schedules
        {
            self.schedules = schedules;
            result = UpdateResult::Changed;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{DaySet, Schedule};

    fn sample_state() -> DeviceState {
        DeviceState {
            pins: PinAssignment::new(4, 5, 6),
            color: RgbColor::new(10, 20, 30),
            schedules: ScheduleSet::try_from(vec![
                Schedule::new(100, 200, RgbColor::new(255, 0, 0)),
                Schedule::new(300, 400, RgbColor::new(0, 0, 255)).with_days(DaySet::WEEKEND),
            ])
            .unwrap(),
        }
    }

    #[test]
    fn defaults_match_boot_state() {
        let s = DeviceState::default();
        assert_eq!(s.pins, PinAssignment::new(25, 26, 27));
        assert_eq!(s.color, RgbColor::OFF);
        assert!(s.schedules.is_empty());
    }

    #[test]
    fn document_shape() {
        let doc = sample_state().to_document();
        assert_eq!(doc["pins"], serde_json::json!({"r": 4, "g": 5, "b": 6}));
        assert_eq!(doc["color"], serde_json::json!({"r": 10, "g": 20, "b": 30}));
        assert_eq!(doc["schedules"][0]["start"], 100);
        assert_eq!(doc["schedules"][0]["end"], 200);
        assert!(doc["schedules"][0].get("daysActive").is_none());
        assert_eq!(
            doc["schedules"][1]["daysActive"],
            serde_json::json!(["Saturday", "Sunday"])
        );
    }

    #[test]
    fn document_roundtrip_preserves_order() {
        let state = sample_state();
        let json = serde_json::to_string(&state).unwrap();
        let back: DeviceState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
        assert_eq!(back.schedules.get(0).unwrap().start, 100);
        assert_eq!(back.schedules.get(1).unwrap().start, 300);
    }

    #[test]
    fn strict_parse_rejects_inverted_schedule() {
        let json = r#"{"schedules":[{"start":5,"end":1,"color":{"r":0,"g":0,"b":0}}]}"#;
        assert!(serde_json::from_str::<DeviceState>(json).is_err());
    }

    #[test]
    fn strict_parse_fills_missing_sections() {
        let s: DeviceState = serde_json::from_str("{}").unwrap();
        assert_eq!(s, DeviceState::default());
    }

    #[test]
    fn merge_empty_update_is_unchanged() {
        let mut s = sample_state();
        assert_eq!(s.merge(ValidatedUpdate::default()), UpdateResult::Unchanged);
        assert_eq!(s, sample_state());
    }

    #[test]
    fn merge_identical_values_is_unchanged() {
        let mut s = sample_state();
        let update = ValidatedUpdate {
            pins: Some(s.pins),
            color: Some(s.color),
            schedules: Some(s.schedules.clone()),
            rejected: vec![],
        };
        assert_eq!(s.merge(update), UpdateResult::Unchanged);
    }

    #[test]
    fn merge_new_color_changes() {
        let mut s = sample_state();
        let update = ValidatedUpdate {
            color: Some(RgbColor::new(1, 1, 1)),
            ..ValidatedUpdate::default()
        };
        assert_eq!(s.merge(update), UpdateResult::Changed);
        assert_eq!(s.color, RgbColor::new(1, 1, 1));
        assert_eq!(s.schedules.len(), 2, "schedules untouched");
    }

    #[test]
    fn merge_replaces_schedules_wholesale() {
        let mut s = sample_state();
        let update = ValidatedUpdate {
            schedules: Some(ScheduleSet::new()),
            ..ValidatedUpdate::default()
        };
        assert_eq!(s.merge(update), UpdateResult::Changed);
        assert!(s.schedules.is_empty());
    }
}
