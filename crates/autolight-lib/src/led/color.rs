//! Color and pin value types.
//!
//! Colors are three 8-bit intensity channels; document form is `{"r","g","b"}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An RGB color with one 0-255 intensity per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    /// All channels off.
    pub const OFF: RgbColor = RgbColor::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        RgbColor { r, g, b }
    }

    /// Build a color from untrusted integers, clamping each channel to 0-255.
    pub fn from_untrusted(r: i64, g: i64, b: i64) -> Self {
        RgbColor {
            r: clamp_channel(r),
            g: clamp_channel(g),
            b: clamp_channel(b),
        }
    }

    pub fn set_r(&mut self, r: u8) {
        self.r = r;
    }

    pub fn set_g(&mut self, g: u8) {
        self.g = g;
    }

    pub fn set_b(&mut self, b: u8) {
        self.b = b;
    }

    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_color(*self))
    }
}

fn clamp_channel(v: i64) -> u8 {
    v.clamp(0, 255) as u8
}

/// GPIO identifiers driving the red, green and blue channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAssignment {
    #[serde(rename = "r")]
    pub r_pin: u8,
    #[serde(rename = "g")]
    pub g_pin: u8,
    #[serde(rename = "b")]
    pub b_pin: u8,
}

pub const DEFAULT_RED_PIN: u8 = 25;
pub const DEFAULT_GREEN_PIN: u8 = 26;
pub const DEFAULT_BLUE_PIN: u8 = 27;

impl Default for PinAssignment {
    fn default() -> Self {
        PinAssignment {
            r_pin: DEFAULT_RED_PIN,
            g_pin: DEFAULT_GREEN_PIN,
            b_pin: DEFAULT_BLUE_PIN,
        }
    }
}

impl PinAssignment {
    pub const fn new(r_pin: u8, g_pin: u8, b_pin: u8) -> Self {
        PinAssignment {
            r_pin,
            g_pin,
            b_pin,
        }
    }

    pub fn set_r_pin(&mut self, pin: u8) {
        self.r_pin = pin;
    }

    pub fn set_g_pin(&mut self, pin: u8) {
        self.g_pin = pin;
    }

    pub fn set_b_pin(&mut self, pin: u8) {
        self.b_pin = pin;
    }

    /// True if two channels share a pin.
    pub fn has_collision(&self) -> bool {
        self.r_pin == self.g_pin || self.r_pin == self.b_pin || self.g_pin == self.b_pin
    }
}

impl fmt::Display for PinAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r={} g={} b={}", self.r_pin, self.g_pin, self.b_pin)
    }
}

/// Parse a color string.
///
/// Accepts:
/// - Hex: `"#FF0000"`, `"FF0000"`, `"#ff0000"`
/// - Channels: `"255,0,0"` (each 0-255)
/// - Named: `"red"`, `"green"`, `"blue"`, `"white"`, `"orange"`, `"yellow"`, `"purple"`, `"cyan"`, `"off"`
pub fn parse_color(s: &str) -> crate::error::Result<RgbColor> {
    let s = s.trim();

    match s.to_lowercase().as_str() {
        "red" => return Ok(RgbColor::new(255, 0, 0)),
        "green" => return Ok(RgbColor::new(0, 255, 0)),
        "blue" => return Ok(RgbColor::new(0, 0, 255)),
        "white" => return Ok(RgbColor::new(255, 255, 255)),
        "orange" => return Ok(RgbColor::new(255, 128, 0)),
        "yellow" => return Ok(RgbColor::new(255, 255, 0)),
        "purple" => return Ok(RgbColor::new(128, 0, 255)),
        "cyan" => return Ok(RgbColor::new(0, 255, 255)),
        "off" | "black" => return Ok(RgbColor::OFF),
        _ => {}
    }

    if s.contains(',') {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(crate::AutolightError::Color(format!(
                "Invalid color: {s} (use R,G,B with three channels)"
            )));
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            *slot = part.parse::<u8>().map_err(|_| {
                crate::AutolightError::Color(format!("Invalid channel {part:?} in {s} (0-255)"))
            })?;
        }
        return Ok(RgbColor::new(channels[0], channels[1], channels[2]));
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 {
        return Err(crate::AutolightError::Color(format!(
            "Invalid color: {s} (use #RRGGBB, R,G,B or a color name)"
        )));
    }
    let val = u32::from_str_radix(hex, 16)
        .map_err(|_| crate::AutolightError::Color(format!("Invalid hex color: {s}")))?;
    Ok(RgbColor::new(
        ((val >> 16) & 0xFF) as u8,
        ((val >> 8) & 0xFF) as u8,
        (val & 0xFF) as u8,
    ))
}

/// Format a color as `#RRGGBB`.
pub fn format_color(color: RgbColor) -> String {
    format!("#{:02X}{:02X}{:02X}", color.r, color.g, color.b)
}
