//! AutoLight: schedule-driven RGB light control.
//!
//! The library decides, once per tick, which color an RGB output should show
//! (a manual color or the first matching schedule) and writes it to the
//! hardware only when it changes.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod led;
pub mod persistence;
pub mod schedule;
pub mod service;
pub mod state;
pub mod validate;

pub use error::AutolightError;
