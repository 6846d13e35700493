//! `resolve` subcommand: which color would be live at a given time.

use chrono::Local;

use super::{Globals, ResolveOutput, Result, kv, kv_width, print_json, resolution_json};
use autolight_lib::clock::parse_instant;
use autolight_lib::engine::ScheduleEngine;

pub(super) fn cmd_resolve(globals: &Globals, at: Option<&str>) -> Result<()> {
    // Recurring windows are projected into the zone of `at`, so an explicit
    // instant is viewed in the local zone with its DST rules, not its offset.
    let at = match at {
        Some(s) => parse_instant(s)?.with_timezone(&Local),
        None => Local::now(),
    };
    let (_, state) = globals.load_state()?;
    let resolution = ScheduleEngine::new().evaluate(&state, &at);

    if globals.json {
        return print_json(&ResolveOutput {
            at: at.to_rfc3339(),
            resolution: resolution_json(resolution),
        });
    }
    let w = kv_width(&["At:", "Resolution:"], &[]);
    kv("At:", at.format("%Y-%m-%d %H:%M:%S %:z"), w);
    kv("Resolution:", resolution, w);
    Ok(())
}
