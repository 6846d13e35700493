//! CLI subcommands: run loop, state inspection and editing, dry-run resolution.

mod config_cmd;
mod edit;
mod resolve;
mod run;
mod show;

use std::path::PathBuf;

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use autolight_lib::AutolightError;
pub(super) use autolight_lib::config::Config;
pub(super) use autolight_lib::engine::Resolution;
pub(super) use autolight_lib::error::Result;
pub(super) use autolight_lib::led::{self, PinAssignment};
pub(super) use autolight_lib::persistence::{JsonFileStore, StateStore};
pub(super) use autolight_lib::schedule::ScheduleSet;
pub(super) use autolight_lib::state::DeviceState;

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{key:<width$}{value}", width = w);
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AutolightError::Document(e.to_string()))?;
    println!("{text}");
    Ok(())
}

// ── Global options ──

/// Options shared by every subcommand.
pub struct Globals {
    pub json: bool,
    pub config_path: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
}

impl Globals {
    /// Config file in effect: `--config` or the platform default.
    pub(super) fn config_file(&self) -> Option<PathBuf> {
        self.config_path.clone().or_else(Config::path)
    }

    pub(super) fn load_config(&self) -> Config {
        match &self.config_path {
            Some(path) => {
                let (config, warnings) = Config::load_from(path);
                for w in &warnings {
                    log::warn!("{w}");
                }
                config
            }
            None => Config::load(),
        }
    }

    /// State file in effect: `--state-file`, then the config, then the default.
    pub(super) fn state_path(&self, config: &Config) -> Result<PathBuf> {
        self.state_file
            .clone()
            .or_else(|| config.state_path())
            .ok_or_else(|| {
                AutolightError::Config("no config directory, pass --state-file".into())
            })
    }

    /// Load the light state, logging anything dropped on the way.
    pub(super) fn load_state(&self) -> Result<(PathBuf, DeviceState)> {
        let config = self.load_config();
        let path = self.state_path(&config)?;
        let (state, warnings) = JsonFileStore::new(&path).load();
        for w in &warnings {
            log::warn!("{w}");
        }
        Ok((path, state))
    }
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct ScheduleJson {
    /// 1-based, as accepted by `schedule remove`.
    pub number: usize,
    pub start: i64,
    pub end: i64,
    pub start_local: String,
    pub end_local: String,
    pub color: String,
    pub days: String,
}

#[derive(Serialize)]
pub(super) struct ResolutionJson {
    pub source: &'static str,
    pub schedule: Option<usize>,
    pub color: String,
}

#[derive(Serialize)]
pub(super) struct StateOutput {
    pub state_file: String,
    pub state_file_exists: bool,
    pub pins: PinAssignment,
    pub color: String,
    pub active: ResolutionJson,
    pub schedules: Vec<ScheduleJson>,
}

#[derive(Serialize)]
pub(super) struct ResolveOutput {
    pub at: String,
    pub resolution: ResolutionJson,
}

#[derive(Serialize)]
pub(super) struct UpdateOutput {
    pub changed: bool,
    pub state: serde_json::Value,
}

#[derive(Serialize)]
pub(super) struct ConfigOutput {
    pub config_file: Option<String>,
    pub config_file_exists: bool,
    pub settings: Config,
    pub state_file: Option<String>,
    pub state_file_exists: bool,
    pub problems: Vec<String>,
}

pub(super) fn schedule_rows(schedules: &ScheduleSet) -> Vec<ScheduleJson> {
    schedules
        .iter()
        .enumerate()
        .map(|(i, s)| ScheduleJson {
            number: i + 1,
            start: s.start,
            end: s.end,
            start_local: autolight_lib::clock::format_local(s.start),
            end_local: autolight_lib::clock::format_local(s.end),
            color: led::format_color(s.color),
            days: s.days.to_string(),
        })
        .collect()
}

pub(super) fn resolution_json(resolution: Resolution) -> ResolutionJson {
    ResolutionJson {
        source: match resolution {
            Resolution::Manual(_) => "manual",
            Resolution::Scheduled { .. } => "schedule",
        },
        schedule: resolution.schedule_index().map(|i| i + 1),
        color: led::format_color(resolution.color()),
    }
}

// ── Commands ──

#[derive(Subcommand)]
pub enum Command {
    /// Drive the light: tick until Ctrl+C, reloading the state file on change
    Run {
        /// Stop after this many ticks (default: run until Ctrl+C)
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Show pins, manual color, schedules and the color active now
    Show,

    /// Set the manual color (name, #RRGGBB or r,g,b)
    SetColor {
        color: String,
    },

    /// Set the red, green and blue output pins
    SetPins {
        r: u8,
        g: u8,
        b: u8,
    },

    /// List or edit schedules
    Schedule {
        #[command(subcommand)]
        action: ScheduleCommand,
    },

    /// Resolve the color for a given time without touching the output
    Resolve {
        /// Epoch seconds, RFC 3339 or local "YYYY-MM-DD HH:MM[:SS]" (default: now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Show current configuration and file paths
    Config,
}

#[derive(Subcommand)]
pub enum ScheduleCommand {
    /// List schedules in priority order
    List,

    /// Append a schedule (lowest priority)
    Add {
        /// Window start (epoch seconds, RFC 3339 or local "YYYY-MM-DD HH:MM[:SS]")
        #[arg(long)]
        start: String,
        /// Window end, same formats as --start
        #[arg(long)]
        end: String,
        /// Color while the schedule is active
        #[arg(long)]
        color: String,
        /// Repeat on these days (e.g. "weekdays", "mon,wed,fri", "all")
        #[arg(long)]
        days: Option<String>,
    },

    /// Remove a schedule by its number in `schedule list`
    Remove {
        number: usize,
    },

    /// Remove all schedules
    Clear,
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, globals: &Globals) -> Result<()> {
    match cmd {
        Command::Run { ticks } => {
            if globals.json {
                warn_json_unsupported("run");
            }
            run::cmd_run(globals, ticks)
        }
        Command::Show => show::cmd_show(globals),
        Command::SetColor { color } => edit::cmd_set_color(globals, &color),
        Command::SetPins { r, g, b } => edit::cmd_set_pins(globals, PinAssignment::new(r, g, b)),
        Command::Schedule { action } => match action {
            ScheduleCommand::List => show::cmd_schedule_list(globals),
            ScheduleCommand::Add {
                start,
                end,
                color,
                days,
            } => edit::cmd_schedule_add(globals, &start, &end, &color, days.as_deref()),
            ScheduleCommand::Remove { number } => edit::cmd_schedule_remove(globals, number),
            ScheduleCommand::Clear => edit::cmd_schedule_clear(globals),
        },
        Command::Resolve { at } => resolve::cmd_resolve(globals, at.as_deref()),
        Command::Config => config_cmd::cmd_config(globals),
    }
}
