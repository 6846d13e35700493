//! `show` and `schedule list` subcommands.

use chrono::Local;

use super::{
    DeviceState, Globals, Result, StateOutput, kv, kv_width, led, print_json, resolution_json,
    schedule_rows,
};
use autolight_lib::engine::ScheduleEngine;

fn print_schedules(state: &DeviceState) {
    if state.schedules.is_empty() {
        println!("  (none)");
        return;
    }
    for row in schedule_rows(&state.schedules) {
        println!(
            "  {:>2}. {} -> {}  {}  {}",
            row.number, row.start_local, row.end_local, row.color, row.days
        );
    }
}

pub(super) fn cmd_show(globals: &Globals) -> Result<()> {
    let (path, state) = globals.load_state()?;
    let exists = path.exists();
    let active = ScheduleEngine::new().evaluate(&state, &Local::now());

    if globals.json {
        return print_json(&StateOutput {
            state_file: path.display().to_string(),
            state_file_exists: exists,
            pins: state.pins,
            color: led::format_color(state.color),
            active: resolution_json(active),
            schedules: schedule_rows(&state.schedules),
        });
    }

    let w = kv_width(&["State file:", "Pins:", "Color:", "Active:", "Schedules:"], &[]);
    if exists {
        kv("State file:", format_args!("{} (loaded)", path.display()), w);
    } else {
        kv(
            "State file:",
            format_args!("{} (not found, using defaults)", path.display()),
            w,
        );
    }
    println!();
    kv("Pins:", state.pins, w);
    kv("Color:", led::format_color(state.color), w);
    kv("Active:", active, w);
    kv("Schedules:", state.schedules.len(), w);
    print_schedules(&state);
    Ok(())
}

pub(super) fn cmd_schedule_list(globals: &Globals) -> Result<()> {
    let (_, state) = globals.load_state()?;
    if globals.json {
        return print_json(&schedule_rows(&state.schedules));
    }
    print_schedules(&state);
    Ok(())
}
