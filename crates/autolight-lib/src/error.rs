//! Unified error type for the autolight-lib crate.
//!
//! [`AutolightError`] wraps the driver error type and the domain error kinds
//! (`Document`, `Config`, `Color`, `Time`). `From` impls let `?` propagate across
//! module boundaries.

use std::fmt;

use crate::led::DriverError;

/// Unified error type for autolight-lib operations.
#[derive(Debug)]
pub enum AutolightError {
    /// Output driver failure (pin export, duty cycle write).
    Driver(DriverError),
    /// Standard I/O error (state or config persistence).
    Io(std::io::Error),
    /// An update document that cannot be interpreted at all.
    Document(String),
    /// Configuration validation error.
    Config(String),
    /// Color parsing error.
    Color(String),
    /// Date/time parsing error.
    Time(String),
}

impl fmt::Display for AutolightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutolightError::Driver(e) => write!(f, "{e}"),
            AutolightError::Io(e) => write!(f, "I/O error: {e}"),
            AutolightError::Document(e) => write!(f, "Document error: {e}"),
            AutolightError::Config(e) => write!(f, "Config error: {e}"),
            AutolightError::Color(e) => write!(f, "Color error: {e}"),
            AutolightError::Time(e) => write!(f, "Time error: {e}"),
        }
    }
}

impl std::error::Error for AutolightError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AutolightError::Driver(e) => Some(e),
            AutolightError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DriverError> for AutolightError {
    fn from(e: DriverError) -> Self {
        AutolightError::Driver(e)
    }
}

impl From<std::io::Error> for AutolightError {
    fn from(e: std::io::Error) -> Self {
        AutolightError::Io(e)
    }
}

/// Crate-level Result alias using [`AutolightError`].
pub type Result<T> = std::result::Result<T, AutolightError>;
