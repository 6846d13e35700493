//! Change hooks: run a user-defined command after an accepted state change.

use std::io;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::Config;

/// Guard preventing concurrent hook execution.
static HOOK_RUNNING: AtomicBool = AtomicBool::new(false);

/// Default timeout for hook commands (30 seconds).
const HOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval when waiting for a hook process to exit.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Environment variable carrying the origin of the change (`cli`, `file`, ...).
pub const ORIGIN_ENV: &str = "AUTOLIGHT_ORIGIN";

/// Run `on_change_command` for a change that came from `origin`.
///
/// The command runs in a background thread so the tick loop never waits on
/// it. Empty commands are ignored. Only one hook runs at a time; while one is
/// in flight, further changes skip theirs with a warning.
pub fn run_change_hook(config: &Config, origin: &str) {
    run_hook(&config.on_change_command, origin);
}

fn run_hook(command: &str, origin: &str) {
    let command = command.trim();
    if command.is_empty() {
        return;
    }
    if HOOK_RUNNING
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        log::warn!("hook skipped (previous hook still running): {command}");
        return;
    }
    let command = command.to_string();
    let origin = origin.to_string();
    std::thread::spawn(move || {
        let result = run_hook_with_timeout(&command, &origin, HOOK_TIMEOUT);
        HOOK_RUNNING.store(false, Ordering::SeqCst);
        match result {
            Ok(s) if !s.success() => {
                log::warn!("hook command exited with {s}: {command}");
            }
            Err(e) => {
                log::warn!("hook command failed: {e}: {command}");
            }
            _ => {}
        }
    });
}

/// Run a shell command with a timeout. Kills the process if it exceeds the deadline.
fn run_hook_with_timeout(command: &str, origin: &str, timeout: Duration) -> io::Result<ExitStatus> {
    let mut cmd = if cfg!(windows) {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = std::process::Command::new("sh");
        c.args(["-c", command]);
        c
    };
    let mut child = cmd.env(ORIGIN_ENV, origin).spawn()?;

    let max_polls = (timeout.as_millis() / POLL_INTERVAL.as_millis()).max(1) as u64;
    for _ in 0..max_polls {
        match child.try_wait()? {
            Some(status) => return Ok(status),
            None => std::thread::sleep(POLL_INTERVAL),
        }
    }

    log::warn!("hook command timed out after {timeout:?}, killing: {command}");
    let _ = child.kill();
    child.wait()
}
