//! # Data Retrieval Module
//!
//! The seam between the request controller and the network.
//!
//! ## Contained Modules:
//!
//! - **`transport`**: the [`Transport`] trait, the request it carries and the
//!   [`TransportError`] taxonomy. Anything that can turn a request into a parsed
//!   JSON payload, and stops when its future is dropped, can back a channel.
//! - **`ky_http`**: [`ky_http::ApiClient`], the `reqwest` / `reqwest-middleware`
//!   implementation used in production.

/// HTTP transport built on `reqwest` and `reqwest-middleware`.
pub mod ky_http;
/// The transport trait and its request/error types.
pub mod transport;

pub use transport::{Transport, TransportError, TransportRequest};
