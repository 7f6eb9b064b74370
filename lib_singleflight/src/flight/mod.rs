//! # Single-Flight Channels
//!
//! A named channel carries at most one outstanding request. The controller
//! decides per `send` whether to suppress a duplicate, cancel and replace a
//! superseded request, or simply start; the answer is classified and routed to
//! the request's callbacks or to the shared [`FlightDefaults`].
//!
//! ## Contained Modules:
//!
//! - **`spec`**: [`RequestSpec`] builder, request identity and callback types.
//! - **`defaults`**: one-shot configurable rules and reactions.
//! - **`handle`**: [`RequestHandle`] and the [`Dispatch`] sentinel.
//! - **`request`**: the per-request task.
//! - **`registry`**: [`SingleFlight`], the channel registry, and its [`Channel`] view.

/// One-shot configurable default rules and reactions.
pub mod defaults;
/// Handles to issued requests and the result of `send`.
pub mod handle;
/// The channel registry.
pub mod registry;
/// Request specification, identity and callback types.
pub mod spec;

mod request;

#[cfg(test)]
pub(crate) mod testing;

pub use defaults::{ErrorAction, FlightDefaults, PermissionAction};
pub use handle::{Dispatch, RequestHandle};
pub use registry::{Channel, FlightError, SingleFlight};
pub use spec::{ErrorEvent, RequestIdentity, RequestSpec, Settlement};
