//! Channel writes: the only place pin intensities are issued.

use super::color::{PinAssignment, RgbColor};
use super::driver::{DriverResult, OutputDriver};

/// Write all three channels of `color` to their assigned pins.
///
/// Channels are written back to back in red, green, blue order. Callers go
/// through [`super::DebouncedApplier`], which serializes every write, so no
/// other color can interleave with a partially written one.
pub fn write_color(
    driver: &impl OutputDriver,
    pins: &PinAssignment,
    color: RgbColor,
) -> DriverResult<()> {
    driver.write(pins.r_pin, color.r)?;
    driver.write(pins.g_pin, color.g)?;
    driver.write(pins.b_pin, color.b)?;
    Ok(())
}
