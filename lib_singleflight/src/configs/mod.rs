//! # Configuration Modules
//!
//! Runtime settings for the request controller and its HTTP transport.

/// Layered settings: built-in defaults, an optional JSON5 file, then environment.
pub mod config_flight;

pub use config_flight::{load_settings, FlightSettings, SettingsError};
