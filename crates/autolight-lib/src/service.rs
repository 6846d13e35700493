//! Light service: the host that owns the device state.
//!
//! Ticks and configuration updates both take `&mut self`, so they can never
//! interleave. Hosts that receive updates on other threads wrap the service
//! in a single `Mutex`.

use chrono::{DateTime, TimeZone};
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::engine::{Resolution, ScheduleEngine};
use crate::error::Result;
use crate::led::{ApplyOutcome, DebouncedApplier, OutputDriver, RgbColor};
use crate::persistence::StateStore;
use crate::state::{DeviceState, UpdateResult};
use crate::validate::{Rejection, validate_update};

/// Called after every accepted change with the origin id and the new state.
pub type UpdateHandler = Box<dyn FnMut(&str, &DeviceState)>;

/// Result of [`LightService::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub result: UpdateResult,
    /// Sections and entries dropped by validation.
    pub rejected: Vec<Rejection>,
    /// Color resolved right after the change; `None` when nothing changed.
    pub resolution: Option<Resolution>,
}

/// Result of one [`LightService::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub resolution: Resolution,
    pub applied: ApplyOutcome,
}

pub struct LightService<D: OutputDriver, S: StateStore, C: Clock = SystemClock> {
    state: DeviceState,
    engine: ScheduleEngine,
    applier: DebouncedApplier,
    driver: D,
    store: S,
    clock: C,
    handlers: Vec<UpdateHandler>,
    current: Option<Resolution>,
}

impl<D: OutputDriver, S: StateStore> LightService<D, S, SystemClock> {
    pub fn new(driver: D, store: S) -> Self {
        Self::with_clock(driver, store, SystemClock)
    }
}

impl<D: OutputDriver, S: StateStore, C: Clock> LightService<D, S, C> {
    pub fn with_clock(driver: D, store: S, clock: C) -> Self {
        LightService {
            state: DeviceState::default(),
            engine: ScheduleEngine::new(),
            applier: DebouncedApplier::new(),
            driver,
            store,
            clock,
            handlers: Vec::new(),
            current: None,
        }
    }

    /// Boot: load the stored state, resolve it at the current time and drive
    /// the result once. A schedule active at boot is lit immediately.
    ///
    /// Load problems are logged and never fatal. A driver failure is returned;
    /// the next tick retries the write.
    pub fn begin(&mut self) -> Result<()> {
        let (state, warnings) = self.store.load();
        for w in &warnings {
            log::warn!("{w}");
        }
        log::info!(
            "[state] loaded: pins {}, color {}, {} schedule(s)",
            state.pins,
            state.color,
            state.schedules.len()
        );
        self.state = state;
        self.engine.reset();
        self.applier.invalidate();
        self.current = None;
        let now = self.clock.now();
        let resolution = self.engine.evaluate(&self.state, &now);
        self.note_transition(resolution);
        self.applier
            .apply(resolution.color(), &self.state.pins, &self.driver)?;
        Ok(())
    }

    /// Current state as the exchange document.
    pub fn read(&self) -> Value {
        self.state.to_document()
    }

    /// Validate and merge an incoming document from `origin`.
    ///
    /// On change: persist, re-resolve immediately, drive the output and
    /// notify the update handlers. An unchanged update does none of these.
    /// A document that is not an object is rejected whole.
    pub fn update(&mut self, doc: &Value, origin: &str) -> Result<UpdateOutcome> {
        let validated = validate_update(doc)?;
        let rejected = validated.rejected.clone();
        let old_pins = self.state.pins;
        let result = self.state.merge(validated);
        if result == UpdateResult::Unchanged {
            log::debug!("[update] {origin}: no change");
            return Ok(UpdateOutcome {
                result,
                rejected,
                resolution: None,
            });
        }
        log::info!("[update] {origin}: state changed");

        self.store.save(&self.state)?;

        if self.state.pins != old_pins {
            log::info!("[update] pins {old_pins} -> {}", self.state.pins);
            self.applier.invalidate();
        }
        self.engine.reset();
        let now = self.clock.now();
        let resolution = self.engine.evaluate(&self.state, &now);
        self.note_transition(resolution);
        if let Err(e) = self
            .applier
            .apply(resolution.color(), &self.state.pins, &self.driver)
        {
            log::warn!("[output] write failed after update, retrying next tick: {e}");
        }

        for handler in &mut self.handlers {
            handler(origin, &self.state);
        }
        Ok(UpdateOutcome {
            result,
            rejected,
            resolution: Some(resolution),
        })
    }

    /// One tick at the clock's current time.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let now = self.clock.now();
        self.tick_at(&now)
    }

    /// One tick at `now`: resolve, then drive the output if the color changed.
    pub fn tick_at<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Result<TickOutcome> {
        let resolution = self.engine.evaluate(&self.state, now);
        self.note_transition(resolution);
        let applied = self
            .applier
            .apply(resolution.color(), &self.state.pins, &self.driver)
            .inspect_err(|e| log::warn!("[output] write failed: {e}"))?;
        Ok(TickOutcome {
            resolution,
            applied,
        })
    }

    /// Drive the output off, e.g. on shutdown.
    pub fn turn_off(&mut self) -> Result<()> {
        self.applier
            .apply(RgbColor::OFF, &self.state.pins, &self.driver)?;
        Ok(())
    }

    pub fn add_update_handler(&mut self, handler: impl FnMut(&str, &DeviceState) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Color currently on the output, if any write succeeded.
    pub fn output(&self) -> Option<RgbColor> {
        self.applier.last_applied()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn note_transition(&mut self, resolution: Resolution) {
        let previous = self.current.map(|r| r.schedule_index());
        if previous != Some(resolution.schedule_index()) {
            match resolution {
                Resolution::Scheduled { index, color } => {
                    log::info!("[schedule] schedule #{} active ({color})", index + 1)
                }
                Resolution::Manual(color) => {
                    log::info!("[schedule] no schedule active, manual color {color}")
                }
            }
        }
        self.current = Some(resolution);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::led::PinAssignment;
    use crate::led::mock::MockDriver;
    use crate::persistence::MemoryStore;
    use crate::schedule::{Schedule, ScheduleSet};
    use chrono::{TimeDelta, Utc};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    type TestService = LightService<MockDriver, MemoryStore, FixedClock<Utc>>;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
    }

    fn service() -> TestService {
        let mut s = LightService::with_clock(MockDriver::new(), MemoryStore::new(), FixedClock::new(noon()));
        s.begin().unwrap();
        s
    }

    fn window(from_h: u32, to_h: u32) -> (i64, i64) {
        let day = |h| Utc.with_ymd_and_hms(2024, 3, 4, h, 0, 0).unwrap().timestamp();
        (day(from_h), day(to_h))
    }

    // ── begin / read ──

    #[test]
    fn begin_drives_stored_manual_color() {
        let stored = DeviceState {
            color: RgbColor::new(7, 8, 9),
            ..DeviceState::default()
        };
        let mut s = LightService::with_clock(
            MockDriver::new(),
            MemoryStore::with_state(stored),
            FixedClock::new(noon()),
        );
        s.begin().unwrap();
        assert_eq!(*s.driver().writes.borrow(), vec![(25, 7), (26, 8), (27, 9)]);
        assert_eq!(s.output(), Some(RgbColor::new(7, 8, 9)));
    }

    #[test]
    fn begin_drives_schedule_active_at_boot() {
        let (start, end) = window(11, 13);
        let stored = DeviceState {
            color: RgbColor::new(10, 10, 10),
            schedules: ScheduleSet::try_from(vec![Schedule::new(start, end, RgbColor::new(0, 0, 255))])
                .unwrap(),
            ..DeviceState::default()
        };
        let mut s = LightService::with_clock(
            MockDriver::new(),
            MemoryStore::with_state(stored),
            FixedClock::new(noon()),
        );
        s.begin().unwrap();
        let t = s.tick().unwrap();

        assert_eq!(t.applied, ApplyOutcome::Unchanged);
        assert_eq!(t.resolution, Resolution::Scheduled { index: 0, color: RgbColor::new(0, 0, 255) });
        assert_eq!(*s.driver().writes.borrow(), vec![(25, 0), (26, 0), (27, 255)]);
        assert_eq!(s.output(), Some(RgbColor::new(0, 0, 255)));
    }

    #[test]
    fn begin_on_empty_store_writes_off() {
        let s = service();
        assert_eq!(s.driver().write_count(), 3);
        assert_eq!(s.output(), Some(RgbColor::OFF));
    }

    #[test]
    fn read_returns_document() {
        let s = service();
        let doc = s.read();
        assert_eq!(doc["pins"], json!({"r": 25, "g": 26, "b": 27}));
        assert_eq!(doc["schedules"], json!([]));
    }

    // ── update ──

    #[test]
    fn manual_color_update_applies_and_persists() {
        let mut s = service();
        let out = s
            .update(&json!({"color": {"r": 255, "g": 128, "b": 0}}), "http")
            .unwrap();
        assert_eq!(out.result, UpdateResult::Changed);
        assert_eq!(out.resolution, Some(Resolution::Manual(RgbColor::new(255, 128, 0))));
        assert_eq!(s.store().saves, 1);
        assert_eq!(s.output(), Some(RgbColor::new(255, 128, 0)));
        assert_eq!(s.driver().last_value(25), Some(255));
    }

    #[test]
    fn unchanged_update_skips_persist_and_notify() {
        let mut s = service();
        let calls = Rc::new(RefCell::new(0));
        let c = Rc::clone(&calls);
        s.add_update_handler(move |_, _| *c.borrow_mut() += 1);
        let doc = json!({"color": {"r": 0, "g": 0, "b": 0}});
        let out = s.update(&doc, "ws").unwrap();
        assert_eq!(out.result, UpdateResult::Unchanged);
        assert_eq!(out.resolution, None);
        assert_eq!(s.store().saves, 0);
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(s.driver().write_count(), 3, "only the boot write");
    }

    #[test]
    fn handlers_receive_origin_and_state() {
        let mut s = service();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        s.add_update_handler(move |origin, state| {
            log.borrow_mut().push((origin.to_string(), state.color));
        });
        s.update(&json!({"color": {"r": 1}}), "ws").unwrap();
        assert_eq!(*seen.borrow(), vec![("ws".to_string(), RgbColor::new(1, 0, 0))]);
    }

    #[test]
    fn non_object_update_is_error_and_keeps_state() {
        let mut s = service();
        assert!(s.update(&json!("red"), "http").is_err());
        assert_eq!(*s.state(), DeviceState::default());
    }

    #[test]
    fn pin_change_rewrites_same_color_on_new_pins() {
        let mut s = service();
        s.update(&json!({"color": {"r": 9, "g": 9, "b": 9}}), "cli").unwrap();
        let before = s.driver().write_count();
        s.update(&json!({"pins": {"r": 1, "g": 2, "b": 3}}), "cli").unwrap();
        assert_eq!(s.driver().write_count(), before + 3);
        assert_eq!(s.driver().last_value(1), Some(9));
        assert_eq!(s.state().pins, PinAssignment::new(1, 2, 3));
    }

    #[test]
    fn schedule_update_resolves_immediately() {
        let mut s = service();
        let (start, end) = window(11, 13);
        let out = s
            .update(
                &json!({"schedules": [{"start": start, "end": end, "color": {"r": 0, "g": 0, "b": 255}}]}),
                "http",
            )
            .unwrap();
        assert_eq!(
            out.resolution,
            Some(Resolution::Scheduled {
                index: 0,
                color: RgbColor::new(0, 0, 255)
            })
        );
        assert_eq!(s.output(), Some(RgbColor::new(0, 0, 255)));
        assert_eq!(s.state().color, RgbColor::OFF, "manual color untouched");
    }

    #[test]
    fn rejected_entries_reported_valid_ones_kept() {
        let mut s = service();
        let (start, end) = window(1, 2);
        let out = s
            .update(
                &json!({"schedules": [
                    {"start": start, "end": end},
                    {"start": start, "end": end, "color": {"r": 3, "g": 3, "b": 3}}
                ]}),
                "http",
            )
            .unwrap();
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].field, "schedules[0]");
        assert_eq!(s.state().schedules.len(), 1);
    }

    #[test]
    fn failed_persist_is_reported() {
        let mut s = service();
        s.store_mut().fail_saves = true;
        assert!(s.update(&json!({"color": {"r": 1}}), "http").is_err());
    }

    // ── tick ──

    #[test]
    fn tick_debounces_repeated_color() {
        let mut s = service();
        let first = s.tick().unwrap();
        assert_eq!(first.applied, ApplyOutcome::Unchanged, "boot already wrote off");
        s.clock().advance(TimeDelta::seconds(5));
        assert_eq!(s.tick().unwrap().applied, ApplyOutcome::Unchanged);
        assert_eq!(s.driver().write_count(), 3);
    }

    #[test]
    fn tick_enters_and_leaves_schedule() {
        let mut s = service();
        let (start, end) = window(13, 14);
        s.update(
            &json!({"color": {"r": 10, "g": 10, "b": 10},
                    "schedules": [{"start": start, "end": end, "color": {"r": 255, "g": 0, "b": 0}}]}),
            "http",
        )
        .unwrap();
        assert_eq!(s.output(), Some(RgbColor::new(10, 10, 10)));

        let t = s.tick_at(&Utc.with_ymd_and_hms(2024, 3, 4, 13, 30, 0).unwrap()).unwrap();
        assert_eq!(t.applied, ApplyOutcome::Written);
        assert_eq!(s.output(), Some(RgbColor::new(255, 0, 0)));

        let t = s.tick_at(&Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 1).unwrap()).unwrap();
        assert_eq!(t.resolution, Resolution::Manual(RgbColor::new(10, 10, 10)));
        assert_eq!(s.output(), Some(RgbColor::new(10, 10, 10)));
    }

    #[test]
    fn tick_driver_failure_retries_next_tick() {
        let mut s = service();
        s.update(&json!({"color": {"r": 50}}), "http").unwrap();
        s.driver().fail_writes.set(true);
        s.update(&json!({"color": {"r": 60}}), "http").unwrap();
        assert_eq!(s.output(), None);
        s.clock().advance(TimeDelta::seconds(2));
        assert!(s.tick().is_err());

        s.driver().fail_writes.set(false);
        s.clock().advance(TimeDelta::seconds(2));
        assert_eq!(s.tick().unwrap().applied, ApplyOutcome::Written);
        assert_eq!(s.output(), Some(RgbColor::new(60, 0, 0)));
    }

    #[test]
    fn turn_off_writes_zero() {
        let mut s = service();
        s.update(&json!({"color": {"r": 200, "g": 100, "b": 50}}), "cli").unwrap();
        s.turn_off().unwrap();
        assert_eq!(s.output(), Some(RgbColor::OFF));
        assert_eq!(s.driver().last_value(27), Some(0));
    }
}
