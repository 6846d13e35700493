//! `run` subcommand: drive the light until Ctrl+C.

use std::sync::atomic::Ordering;
use std::time::{Duration, SystemTime};

use super::{AutolightError, Globals, JsonFileStore, RUNNING, Result};
use autolight_lib::hooks;
use autolight_lib::led::{ApplyOutcome, OutputDriver};
use autolight_lib::service::LightService;
use autolight_lib::state::UpdateResult;

type RunService = LightService<Box<dyn OutputDriver>, JsonFileStore>;

/// Feed the state file back through `update` when it changed on disk.
fn reload_if_changed(service: &mut RunService, seen: &mut Option<SystemTime>) {
    let modified = service.store().modified();
    if modified == *seen {
        return;
    }
    *seen = modified;
    if modified.is_none() {
        log::warn!("[state] {} removed, keeping current state", service.store().path().display());
        return;
    }
    let doc = match service.store().read_document() {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("[state] reload failed: {e}");
            return;
        }
    };
    match service.update(&doc, "file") {
        Ok(outcome) if outcome.result == UpdateResult::Changed => {
            println!("[state]  reloaded {}", service.store().path().display());
        }
        Ok(_) => {}
        Err(e) => log::warn!("[state] reload failed: {e}"),
    }
    // A changed update rewrites the file.
    *seen = service.store().modified();
}

pub(super) fn cmd_run(globals: &Globals, ticks: Option<u64>) -> Result<()> {
    let config = globals.load_config();
    if let Err(errors) = config.validate() {
        let reasons: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(AutolightError::Config(reasons.join("; ")));
    }
    let path = globals.state_path(&config)?;
    let driver = config.build_driver()?;

    println!("AutoLight: drives an RGB output from manual color and schedules.");
    println!("[output] {} driver", driver.name());
    println!("[state]  {}", path.display());
    println!("Press Ctrl+C to exit (turns the light off).");
    println!();

    let mut service: RunService = LightService::new(driver, JsonFileStore::new(path));
    let hook_config = config.clone();
    service.add_update_handler(move |origin, _| hooks::run_change_hook(&hook_config, origin));
    if let Err(e) = service.begin() {
        log::warn!("[output] initial write failed, retrying on next tick: {e}");
    }
    let mut seen = service.store().modified();
    let interval = Duration::from_millis(config.tick_interval_ms);

    let mut count = 0u64;
    while RUNNING.load(Ordering::SeqCst) {
        reload_if_changed(&mut service, &mut seen);
        // Failures are logged by the service and retried next tick.
        if let Ok(outcome) = service.tick()
            && outcome.applied == ApplyOutcome::Written
        {
            println!("  {}", outcome.resolution);
        }
        count += 1;
        if ticks.is_some_and(|n| count >= n) {
            break;
        }
        std::thread::sleep(interval);
    }

    println!();
    println!("Turning output off...");
    if let Err(e) = service.turn_off() {
        log::warn!("could not turn output off: {e}");
    }
    println!("Done.");
    Ok(())
}
