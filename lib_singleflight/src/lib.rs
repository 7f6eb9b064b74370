//! # lib_singleflight
//!
//! Single-flight HTTP request channels. A named channel carries at most one
//! outstanding request: an identical repeat is suppressed while the first is
//! still in flight, and a different request cancels the one it supersedes.
//! Responses are classified as success, permission-denied or failure and routed
//! to per-request callbacks or to application-wide defaults.
//!
//! Every top-level folder sits behind a Cargo feature of the same name; `full`
//! (the default) enables all of them.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Response classification rules and the classifier itself.
#[cfg(feature = "classify")]
pub mod classify;

/// Layered runtime settings (defaults, JSON5 file, environment).
#[cfg(feature = "configs")]
pub mod configs;

/// The single-flight channel registry and request dispatch.
#[cfg(feature = "flight")]
pub mod flight;

/// tracing subscriber bootstrap and log file housekeeping.
#[cfg(feature = "loggers")]
pub mod loggers;

/// The transport seam and its reqwest-backed client.
#[cfg(feature = "retrieve")]
pub mod retrieve;

// --- Public API Re-exports ---
#[cfg(feature = "classify")]
pub use classify::{classify, ClassificationRules, Outcome, Rule, RuleOverrides};
#[cfg(feature = "flight")]
pub use flight::{
    Channel, Dispatch, ErrorEvent, FlightDefaults, FlightError, RequestHandle, RequestSpec,
    Settlement, SingleFlight,
};
#[cfg(feature = "retrieve")]
pub use retrieve::{ky_http::ApiClient, Transport, TransportError, TransportRequest};
