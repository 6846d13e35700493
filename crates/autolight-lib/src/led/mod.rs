//! LED output: color and pin value types, output drivers, debounced writes.

mod applier;
mod color;
mod driver;
mod ops;

pub use applier::{ApplyOutcome, DebouncedApplier};
pub use color::{PinAssignment, RgbColor, format_color, parse_color};
pub use driver::{
    DEFAULT_PWM_ROOT, DriverError, DriverResult, LogDriver, OutputDriver, SysfsPwmDriver, mock,
};
pub use ops::write_color;
