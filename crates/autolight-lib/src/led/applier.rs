//! Debounced applier: elides hardware writes when the color is unchanged.

use super::color::{PinAssignment, RgbColor};
use super::driver::{DriverResult, OutputDriver};
use super::ops::write_color;

/// Result of an [`DebouncedApplier::apply`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The color differed from the last applied one and was written.
    Written,
    /// Same color as last time, so no hardware interaction.
    Unchanged,
}

/// Tracks the color last written to the output and skips redundant writes.
///
/// Starts unset, so the first `apply` always writes.
#[derive(Debug, Default)]
pub struct DebouncedApplier {
    last_applied: Option<RgbColor>,
}

impl DebouncedApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `color` to `pins` unless it equals the last applied color.
    ///
    /// On a driver error the last applied color is forgotten, so the next
    /// call rewrites all three channels instead of trusting a partial write.
    pub fn apply(
        &mut self,
        color: RgbColor,
        pins: &PinAssignment,
        driver: &impl OutputDriver,
    ) -> DriverResult<ApplyOutcome> {
        if self.last_applied == Some(color) {
            return Ok(ApplyOutcome::Unchanged);
        }
        match write_color(driver, pins, color) {
            Ok(()) => {
                log::debug!("[output] applied {color} via {}", driver.name());
                self.last_applied = Some(color);
                Ok(ApplyOutcome::Written)
            }
            Err(e) => {
                self.last_applied = None;
                Err(e)
            }
        }
    }

    /// Forget the last applied color so the next `apply` writes.
    ///
    /// Needed when the pin assignment changes: the same color must be
    /// driven onto the new pins.
    pub fn invalidate(&mut self) {
        self.last_applied = None;
    }

    /// The color currently on the output, if one has been written.
    pub fn last_applied(&self) -> Option<RgbColor> {
        self.last_applied
    }
}
