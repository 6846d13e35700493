//! `config` subcommand: show current configuration and file paths.

use super::{ConfigOutput, Globals, Result, kv, kv_indent, kv_width, print_json};

pub(super) fn cmd_config(globals: &Globals) -> Result<()> {
    let config = globals.load_config();
    let config_path = globals.config_file();
    let config_exists = config_path.as_ref().is_some_and(|p| p.exists());
    let state_path = globals.state_path(&config).ok();
    let state_exists = state_path.as_ref().is_some_and(|p| p.exists());
    let problems: Vec<String> = match config.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
    };

    if globals.json {
        return print_json(&ConfigOutput {
            config_file: config_path.as_ref().map(|p| p.display().to_string()),
            config_file_exists: config_exists,
            settings: config,
            state_file: state_path.as_ref().map(|p| p.display().to_string()),
            state_file_exists: state_exists,
            problems,
        });
    }

    // Human-readable output
    let w = kv_width(
        &["Config file:"],
        &[
            "driver:",
            "tick_interval_ms:",
            "pwm_chip:",
            "pwm_period_ns:",
            "pwm_root:",
            "on_change_command:",
            "State file:",
        ],
    );

    match &config_path {
        Some(p) => {
            if config_exists {
                kv("Config file:", format_args!("{} (loaded)", p.display()), w);
            } else {
                kv(
                    "Config file:",
                    format_args!("{} (not found, using defaults)", p.display()),
                    w,
                );
            }
        }
        None => kv("Config file:", "(no config directory)", w),
    }
    println!();

    println!("Settings:");
    let driver_display = match config.driver_kind() {
        Some(kind) => kind.to_string(),
        None => format!("{} (invalid)", config.driver),
    };
    kv_indent("driver:", driver_display, w);
    kv_indent("tick_interval_ms:", config.tick_interval_ms, w);
    kv_indent("pwm_chip:", config.pwm_chip, w);
    kv_indent("pwm_period_ns:", config.pwm_period_ns, w);
    kv_indent("pwm_root:", &config.pwm_root, w);
    let hook = if config.on_change_command.trim().is_empty() {
        "(disabled)"
    } else {
        config.on_change_command.as_str()
    };
    kv_indent("on_change_command:", hook, w);
    println!();

    println!("Files:");
    match &state_path {
        Some(p) => {
            let status = if state_exists { "present" } else { "not found" };
            kv_indent("State file:", format_args!("{} ({status})", p.display()), w);
        }
        None => kv_indent("State file:", "(no config directory)", w),
    }

    if !problems.is_empty() {
        println!();
        println!("Problems:");
        for p in &problems {
            println!("  {p}");
        }
    }
    Ok(())
}
