//! Output drivers: the boundary where intensities reach physical pins.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

// ── Error type ──

#[derive(Debug)]
pub enum DriverError {
    /// Pin number not usable by this driver.
    InvalidPin(u8),
    /// The PWM channel could not be exported or configured.
    ExportFailed(String),
    /// Writing an intensity failed.
    WriteFailed(String),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::InvalidPin(pin) => write!(f, "Invalid output pin: {pin}"),
            DriverError::ExportFailed(e) => write!(f, "Failed to export PWM channel: {e}"),
            DriverError::WriteFailed(e) => write!(f, "Output write failed: {e}"),
        }
    }
}

impl std::error::Error for DriverError {}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Writes an 8-bit intensity to a pin.
pub trait OutputDriver {
    fn write(&self, pin: u8, value: u8) -> DriverResult<()>;

    /// Human-readable driver name for logs and status output.
    fn name(&self) -> &str;
}

impl<T: OutputDriver + ?Sized> OutputDriver for Box<T> {
    fn write(&self, pin: u8, value: u8) -> DriverResult<()> {
        (**self).write(pin, value)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ── Log driver ──

/// Dry-run driver: logs each write, touches no hardware.
#[derive(Debug, Default)]
pub struct LogDriver;

impl OutputDriver for LogDriver {
    fn write(&self, pin: u8, value: u8) -> DriverResult<()> {
        log::info!("[output] pin {pin} <- {value}");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

// ── Linux sysfs PWM ──

/// Default sysfs PWM class directory.
pub const DEFAULT_PWM_ROOT: &str = "/sys/class/pwm";

/// Linux sysfs PWM driver. Pin numbers are channel numbers on one PWM chip.
///
/// Channels are exported lazily on first write, then configured with the
/// driver's period and enabled. Intensity maps linearly onto the duty cycle.
#[derive(Debug)]
pub struct SysfsPwmDriver {
    chip_dir: PathBuf,
    period_ns: u64,
    ready: RefCell<HashSet<u8>>,
}

impl SysfsPwmDriver {
    pub fn new(root: impl AsRef<Path>, chip: u32, period_ns: u64) -> Self {
        SysfsPwmDriver {
            chip_dir: root.as_ref().join(format!("pwmchip{chip}")),
            period_ns,
            ready: RefCell::new(HashSet::new()),
        }
    }

    fn channel_dir(&self, pin: u8) -> PathBuf {
        self.chip_dir.join(format!("pwm{pin}"))
    }

    /// Duty cycle in nanoseconds for an 8-bit intensity.
    pub fn duty_for(&self, value: u8) -> u64 {
        // The quotient never exceeds period_ns, so narrowing back is lossless.
        (u128::from(self.period_ns) * u128::from(value) / 255) as u64
    }

    fn prepare(&self, pin: u8) -> DriverResult<PathBuf> {
        let dir = self.channel_dir(pin);
        if self.ready.borrow().contains(&pin) {
            return Ok(dir);
        }
        if !self.chip_dir.is_dir() {
            return Err(DriverError::ExportFailed(format!(
                "{} does not exist",
                self.chip_dir.display()
            )));
        }
        if !dir.is_dir() {
            std::fs::write(self.chip_dir.join("export"), pin.to_string())
                .map_err(|e| DriverError::ExportFailed(format!("pwm{pin}: {e}")))?;
            if !dir.is_dir() {
                return Err(DriverError::ExportFailed(format!(
                    "pwm{pin} did not appear after export"
                )));
            }
        }
        std::fs::write(dir.join("period"), self.period_ns.to_string())
            .map_err(|e| DriverError::ExportFailed(format!("pwm{pin} period: {e}")))?;
        std::fs::write(dir.join("enable"), "1")
            .map_err(|e| DriverError::ExportFailed(format!("pwm{pin} enable: {e}")))?;
        log::debug!("[output] exported pwm{pin} (period {} ns)", self.period_ns);
        self.ready.borrow_mut().insert(pin);
        Ok(dir)
    }
}

impl OutputDriver for SysfsPwmDriver {
    fn write(&self, pin: u8, value: u8) -> DriverResult<()> {
        let dir = self.prepare(pin)?;
        std::fs::write(dir.join("duty_cycle"), self.duty_for(value).to_string())
            .map_err(|e| DriverError::WriteFailed(format!("pwm{pin}: {e}")))
    }

    fn name(&self) -> &str {
        "sysfs-pwm"
    }
}

// ── Test double ──

pub mod mock {
    use super::*;
    use std::cell::Cell;

    /// In-memory driver for tests. Records every `(pin, value)` write in order.
    #[derive(Debug, Default)]
    pub struct MockDriver {
        pub writes: RefCell<Vec<(u8, u8)>>,
        /// If true, `write` returns an error without recording.
        pub fail_writes: Cell<bool>,
    }

    impl MockDriver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn write_count(&self) -> usize {
            self.writes.borrow().len()
        }

        /// Most recent value written to `pin`, if any.
        pub fn last_value(&self, pin: u8) -> Option<u8> {
            self.writes
                .borrow()
                .iter()
                .rev()
                .find(|(p, _)| *p == pin)
                .map(|(_, v)| *v)
        }
    }

    impl OutputDriver for MockDriver {
        fn write(&self, pin: u8, value: u8) -> DriverResult<()> {
            if self.fail_writes.get() {
                return Err(DriverError::WriteFailed(format!("mock pin {pin}")));
            }
            self.writes.borrow_mut().push((pin, value));
            Ok(())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }
}
