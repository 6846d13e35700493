//! Application configuration: TOML-based, platform-aware paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::led::{DEFAULT_PWM_ROOT, LogDriver, OutputDriver, SysfsPwmDriver};

/// Name of the persisted light state file inside the config directory.
pub const STATE_FILE_NAME: &str = "rgbLightState.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the light state document. Empty = `<config dir>/rgbLightState.json`.
    #[serde(default)]
    pub state_file: String,

    /// Delay between two ticks of the run loop, in milliseconds. Default: 250.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Output driver: "log" (dry run) or "sysfs-pwm". Default: "log".
    #[serde(default = "default_driver")]
    pub driver: String,

    /// PWM chip number for the sysfs driver.
    #[serde(default)]
    pub pwm_chip: u32,

    /// PWM period in nanoseconds for the sysfs driver. Default: 1 ms.
    #[serde(default = "default_pwm_period_ns")]
    pub pwm_period_ns: u64,

    /// Root of the sysfs PWM class. Default: "/sys/class/pwm".
    #[serde(default = "default_pwm_root")]
    pub pwm_root: String,

    /// Command to run after an accepted state change. Empty = disabled.
    #[serde(default)]
    pub on_change_command: String,
}

fn default_tick_interval_ms() -> u64 {
    250
}
fn default_driver() -> String {
    "log".into()
}
fn default_pwm_period_ns() -> u64 {
    1_000_000
}
fn default_pwm_root() -> String {
    DEFAULT_PWM_ROOT.into()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            state_file: String::new(),
            tick_interval_ms: default_tick_interval_ms(),
            driver: default_driver(),
            pwm_chip: 0,
            pwm_period_ns: default_pwm_period_ns(),
            pwm_root: default_pwm_root(),
            on_change_command: String::new(),
        }
    }
}

/// Parsed `driver` selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Log,
    SysfsPwm,
}

impl DriverKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" | "dry-run" => Some(DriverKind::Log),
            "sysfs-pwm" | "pwm" => Some(DriverKind::SysfsPwm),
            _ => None,
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Log => write!(f, "log"),
            DriverKind::SysfsPwm => write!(f, "sysfs-pwm"),
        }
    }
}

/// Validation errors that [`Config::validate`] can return.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// `driver` names no known output driver.
    UnknownDriver(String),
    /// `tick_interval_ms` is zero or above one second.
    InvalidTickInterval(u64),
    /// `pwm_period_ns` is zero.
    ZeroPwmPeriod,
    /// `pwm_root` is empty while the sysfs driver is selected.
    EmptyPwmRoot,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownDriver(d) => {
                write!(f, "Unknown driver \"{d}\" (expected \"log\" or \"sysfs-pwm\")")
            }
            ValidationError::InvalidTickInterval(ms) => {
                write!(f, "Invalid tick interval {ms} ms (expected 1-1000)")
            }
            ValidationError::ZeroPwmPeriod => write!(f, "PWM period cannot be zero"),
            ValidationError::EmptyPwmRoot => write!(f, "PWM root cannot be empty"),
        }
    }
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        #[cfg(windows)]
        {
            dirs::config_dir().map(|p| p.join("AutoLight"))
        }
        #[cfg(not(windows))]
        {
            dirs::config_dir().map(|p| p.join("autolight"))
        }
    }

    /// Full path to config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Resolved path of the light state document.
    pub fn state_path(&self) -> Option<PathBuf> {
        let explicit = self.state_file.trim();
        if explicit.is_empty() {
            Self::dir().map(|d| d.join(STATE_FILE_NAME))
        } else {
            Some(PathBuf::from(explicit))
        }
    }

    /// Load config from disk, or return defaults if not found.
    pub fn load() -> Self {
        let (config, warnings) = Self::load_with_warnings();
        for w in &warnings {
            log::warn!("{w}");
        }
        config
    }

    /// Load config from an arbitrary path, returning the config and any parse warnings.
    ///
    /// Returns `(defaults, [])` if the file doesn't exist.
    /// Returns `(defaults, [warning])` if the file exists but can't be parsed.
    pub fn load_from(path: &Path) -> (Self, Vec<String>) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, vec![]),
                Err(e) => {
                    let warning = format!(
                        "config parse error ({}), using defaults: {e}",
                        path.display()
                    );
                    (Self::default(), vec![warning])
                }
            },
            Err(_) => (Self::default(), vec![]),
        }
    }

    /// Load config from the default path, returning the config and any parse warnings.
    pub fn load_with_warnings() -> (Self, Vec<String>) {
        let Some(path) = Self::path() else {
            return (Self::default(), vec![]);
        };
        Self::load_from(&path)
    }

    /// Parsed driver kind, if `driver` names a known one.
    pub fn driver_kind(&self) -> Option<DriverKind> {
        DriverKind::parse(&self.driver)
    }

    /// Validate the entire config, collecting all errors.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let kind = self.driver_kind();
        if kind.is_none() {
            errors.push(ValidationError::UnknownDriver(self.driver.clone()));
        }
        if self.tick_interval_ms == 0 || self.tick_interval_ms > 1000 {
            errors.push(ValidationError::InvalidTickInterval(self.tick_interval_ms));
        }
        if kind == Some(DriverKind::SysfsPwm) {
            if self.pwm_period_ns == 0 {
                errors.push(ValidationError::ZeroPwmPeriod);
            }
            if self.pwm_root.trim().is_empty() {
                errors.push(ValidationError::EmptyPwmRoot);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Build the configured output driver.
    pub fn build_driver(&self) -> crate::error::Result<Box<dyn OutputDriver>> {
        match self.driver_kind() {
            Some(DriverKind::Log) => Ok(Box::new(LogDriver)),
            Some(DriverKind::SysfsPwm) => Ok(Box::new(SysfsPwmDriver::new(
                &self.pwm_root,
                self.pwm_chip,
                self.pwm_period_ns,
            ))),
            None => Err(crate::AutolightError::Config(
                ValidationError::UnknownDriver(self.driver.clone()).to_string(),
            )),
        }
    }
}
