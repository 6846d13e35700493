//! State editing subcommands: `set-color`, `set-pins`, `schedule add|remove|clear`.
//!
//! Edits go through the same validate-and-merge path as any other update,
//! with origin `cli`. A running `run` loop picks them up from the state file.

use serde_json::{Value, json};

use super::{
    AutolightError, Globals, JsonFileStore, PinAssignment, Result, UpdateOutput, kv, kv_width,
    led, print_json,
};
use autolight_lib::clock::parse_instant;
use autolight_lib::led::LogDriver;
use autolight_lib::schedule::DaySet;
use autolight_lib::service::LightService;
use autolight_lib::state::UpdateResult;
use autolight_lib::validate::validate_update;

type EditService = LightService<LogDriver, JsonFileStore>;

fn open(globals: &Globals) -> Result<EditService> {
    let config = globals.load_config();
    let path = globals.state_path(&config)?;
    let mut service = LightService::new(LogDriver, JsonFileStore::new(path));
    service.begin()?;
    Ok(service)
}

/// Apply `doc`, refusing it whole if any part would be dropped.
///
/// Returns whether the state changed. With `--json` the resulting state is
/// printed here; otherwise the caller prints its own summary.
fn commit(globals: &Globals, service: &mut EditService, doc: Value) -> Result<bool> {
    let checked = validate_update(&doc)?;
    if !checked.rejected.is_empty() {
        let reasons: Vec<String> = checked.rejected.iter().map(|r| r.to_string()).collect();
        return Err(AutolightError::Document(reasons.join("; ")));
    }
    let outcome = service.update(&doc, "cli")?;
    let changed = outcome.result == UpdateResult::Changed;
    if globals.json {
        print_json(&UpdateOutput {
            changed,
            state: service.read(),
        })?;
    } else if !changed {
        println!("No change.");
    }
    Ok(changed)
}

fn current_schedules(service: &EditService) -> Vec<Value> {
    match service.read().get("schedules") {
        Some(Value::Array(entries)) => entries.clone(),
        _ => Vec::new(),
    }
}

pub(super) fn cmd_set_color(globals: &Globals, color: &str) -> Result<()> {
    let color = led::parse_color(color)?;
    let mut service = open(globals)?;
    if commit(globals, &mut service, json!({ "color": color }))? && !globals.json {
        kv("Color:", led::format_color(color), kv_width(&["Color:"], &[]));
    }
    Ok(())
}

pub(super) fn cmd_set_pins(globals: &Globals, pins: PinAssignment) -> Result<()> {
    let mut service = open(globals)?;
    if commit(globals, &mut service, json!({ "pins": pins }))? && !globals.json {
        kv("Pins:", pins, kv_width(&["Pins:"], &[]));
    }
    Ok(())
}

pub(super) fn cmd_schedule_add(
    globals: &Globals,
    start: &str,
    end: &str,
    color: &str,
    days: Option<&str>,
) -> Result<()> {
    let start = parse_instant(start)?;
    let end = parse_instant(end)?;
    let color = led::parse_color(color)?;
    let days = match days {
        Some(d) => DaySet::parse(d).map_err(AutolightError::Time)?,
        None => DaySet::NONE,
    };

    let mut service = open(globals)?;
    let mut entries = current_schedules(&service);
    let mut entry = json!({
        "start": start.timestamp(),
        "end": end.timestamp(),
        "color": color,
    });
    if !days.is_empty() {
        entry["daysActive"] = json!(days);
    }
    entries.push(entry);
    let number = entries.len();

    if commit(globals, &mut service, json!({ "schedules": entries }))? && !globals.json {
        let w = kv_width(&["Added:"], &[]);
        kv(
            "Added:",
            format_args!(
                "#{number} {} -> {} {} ({days})",
                start.format("%Y-%m-%d %H:%M:%S"),
                end.format("%Y-%m-%d %H:%M:%S"),
                led::format_color(color),
            ),
            w,
        );
    }
    Ok(())
}

pub(super) fn cmd_schedule_remove(globals: &Globals, number: usize) -> Result<()> {
    let mut service = open(globals)?;
    let mut entries = current_schedules(&service);
    if number == 0 || number > entries.len() {
        return Err(AutolightError::Config(format!(
            "no schedule #{number} ({} defined)",
            entries.len()
        )));
    }
    entries.remove(number - 1);
    if commit(globals, &mut service, json!({ "schedules": entries }))? && !globals.json {
        println!("Removed schedule #{number}.");
    }
    Ok(())
}

pub(super) fn cmd_schedule_clear(globals: &Globals) -> Result<()> {
    let mut service = open(globals)?;
    if commit(globals, &mut service, json!({ "schedules": [] }))? && !globals.json {
        println!("All schedules removed.");
    }
    Ok(())
}
