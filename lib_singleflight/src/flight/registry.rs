//! # Channel Registry
//!
//! One slot per channel name, created on first use and never removed. A slot
//! remembers the identity of the last request issued on it and the handle of
//! that request while it is in flight.
//!
//! On `send`:
//! - same URL and parameters as the request in flight: suppressed, nothing sent;
//! - anything else: the request in flight (if any) is cancelled, then the new
//!   one is issued.
//!
//! The slot lock is never held while a callback runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use thiserror::Error;
use tokio::runtime::Handle;

use crate::configs::FlightSettings;
use crate::retrieve::ky_http::ApiClient;
use crate::retrieve::{Transport, TransportError, TransportRequest};

use super::defaults::FlightDefaults;
use super::handle::{Dispatch, RequestHandle};
use super::request::Launch;
use super::spec::{RequestIdentity, RequestParts, RequestSpec};

/// Misuse of the controller API. Business outcomes are never errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlightError {
    /// The channel name was empty or whitespace.
    #[error("channel name must not be empty")]
    EmptyChannel,
    /// The request had no resource identifier.
    #[error("request URL must not be empty")]
    MissingUrl,
    /// `send` was called outside a tokio runtime.
    #[error("no tokio runtime is running on this thread")]
    NoRuntime,
}

type Slots = Mutex<HashMap<String, ChannelSlot>>;

#[derive(Default)]
struct ChannelSlot {
    identity: Option<RequestIdentity>,
    in_flight: Option<RequestHandle>,
}

impl ChannelSlot {
    fn live(&self) -> Option<&RequestHandle> {
        self.in_flight.as_ref().filter(|h| !h.is_settled())
    }

    fn is_duplicate(&self, next: &RequestIdentity) -> bool {
        self.live().is_some() && self.identity.as_ref().map_or(false, |prev| prev.matches(next))
    }
}

/// The single-flight request controller.
///
/// Cheap to clone; clones share channels, transport and defaults.
#[derive(Clone)]
pub struct SingleFlight {
    transport: Arc<dyn Transport>,
    defaults: Arc<FlightDefaults>,
    slots: Arc<Slots>,
    next_id: Arc<AtomicU64>,
}

impl SingleFlight {
    /// A controller over `transport` with the given defaults.
    pub fn new(transport: Arc<dyn Transport>, defaults: Arc<FlightDefaults>) -> Self {
        Self {
            transport,
            defaults,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// A controller over `transport` with built-in defaults.
    pub fn with_transport<T: Transport>(transport: T) -> Self {
        Self::new(Arc::new(transport), Arc::new(FlightDefaults::default()))
    }

    /// An [`ApiClient`]-backed controller configured from `settings`.
    ///
    /// # Errors
    /// Fails if the configured base URL is not an absolute URL.
    pub fn from_settings(settings: &FlightSettings) -> Result<Self, TransportError> {
        let client = ApiClient::with_timeout(
            settings.base_url(),
            settings.auth_token.clone(),
            settings.request_timeout(),
        )?;
        Ok(Self::new(
            Arc::new(client),
            Arc::new(FlightDefaults::new(settings.login_page())),
        ))
    }

    /// The defaults this controller falls back to.
    pub fn defaults(&self) -> &Arc<FlightDefaults> {
        &self.defaults
    }

    /// A view bound to one channel name.
    pub fn channel(&self, name: impl Into<String>) -> Channel {
        Channel {
            flight: self.clone(),
            name: name.into(),
        }
    }

    /// Sends `spec` on `channel`, suppressing duplicates and superseding others.
    ///
    /// # Errors
    /// Only contract violations: an empty channel name, an empty URL, or no
    /// tokio runtime to run the request on.
    pub fn send(&self, channel: &str, spec: RequestSpec) -> Result<Dispatch, FlightError> {
        if channel.trim().is_empty() {
            return Err(FlightError::EmptyChannel);
        }
        spec.validate()?;
        let runtime = Handle::try_current().map_err(|_| FlightError::NoRuntime)?;

        let RequestParts {
            method,
            identity,
            rules,
            before,
            callbacks,
        } = spec.into_parts();

        if let Some(gate) = before {
            if !gate() {
                tracing::debug!(channel, url = %identity.url, "send vetoed by pre-send gate");
                return Ok(Dispatch::Vetoed);
            }
        }

        let mut slots = self.lock_slots();
        let slot = slots.entry(channel.to_string()).or_default();

        if slot.is_duplicate(&identity) {
            tracing::debug!(channel, url = %identity.url, "identical request in flight, suppressed");
            return Ok(Dispatch::Suppressed);
        }

        // Abort the superseded request before the new one starts
        if let Some(previous) = slot.in_flight.take() {
            if !previous.is_settled() {
                tracing::debug!(channel, request_id = previous.id(), url = previous.url(), "cancelling superseded request");
                previous.cancel();
            }
        }

        let handle = RequestHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed), &identity.url);
        slot.in_flight = Some(handle.clone());
        slot.identity = Some(identity.clone());

        let registry = Arc::downgrade(&self.slots);
        let name = channel.to_string();
        let launch = Launch {
            handle: handle.clone(),
            request: TransportRequest {
                method,
                url: identity.url,
                data: identity.data,
            },
            rules,
            callbacks,
        };
        // The transport is entered without the slot lock held.
        drop(slots);
        launch.spawn(&runtime, &self.transport, Arc::clone(&self.defaults), move |settled| {
            release(&registry, &name, settled.id());
        });

        tracing::info!(channel, request_id = handle.id(), url = handle.url(), "request issued");
        Ok(Dispatch::Issued(handle))
    }

    /// Cancels the request in flight on `channel`, if there is one.
    ///
    /// Returns whether anything was cancelled. Unknown channels, idle channels
    /// and already settled requests are left untouched.
    pub fn abort(&self, channel: &str) -> bool {
        let mut slots = self.lock_slots();
        let Some(slot) = slots.get_mut(channel) else {
            return false;
        };

        match slot.live() {
            Some(handle) => {
                tracing::debug!(channel, request_id = handle.id(), url = handle.url(), "aborting request");
                handle.cancel();
                slot.in_flight = None;
                true
            }
            None => false,
        }
    }

    /// True while `channel` has a request in flight.
    pub fn is_busy(&self, channel: &str) -> bool {
        self.lock_slots()
            .get(channel)
            .map_or(false, |slot| slot.live().is_some())
    }

    /// Issues `spec` outside any channel: gate, classification and callbacks,
    /// without duplicate detection or cancellation of other requests.
    ///
    /// # Errors
    /// An empty URL or no tokio runtime.
    pub fn request(&self, spec: RequestSpec) -> Result<Dispatch, FlightError> {
        spec.validate()?;
        let runtime = Handle::try_current().map_err(|_| FlightError::NoRuntime)?;

        let RequestParts {
            method,
            identity,
            rules,
            before,
            callbacks,
        } = spec.into_parts();

        if let Some(gate) = before {
            if !gate() {
                tracing::debug!(url = %identity.url, "request vetoed by pre-send gate");
                return Ok(Dispatch::Vetoed);
            }
        }

        let handle = RequestHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed), &identity.url);
        let launch = Launch {
            handle: handle.clone(),
            request: TransportRequest {
                method,
                url: identity.url,
                data: identity.data,
            },
            rules,
            callbacks,
        };
        launch.spawn(&runtime, &self.transport, Arc::clone(&self.defaults), |_| {});

        Ok(Dispatch::Issued(handle))
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, ChannelSlot>> {
        // Callbacks never run under this lock, so a poisoned map is still consistent.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the slot's handle if it still belongs to request `id`.
fn release(slots: &Weak<Slots>, channel: &str, id: u64) {
    let Some(slots) = slots.upgrade() else {
        return;
    };
    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(slot) = slots.get_mut(channel) {
        if slot.in_flight.as_ref().map_or(false, |h| h.id() == id) {
            slot.in_flight = None;
        }
    }
}

/// A [`SingleFlight`] bound to one channel name.
#[derive(Clone)]
pub struct Channel {
    flight: SingleFlight,
    name: String,
}

impl Channel {
    /// The channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// See [`SingleFlight::send`].
    pub fn send(&self, spec: RequestSpec) -> Result<Dispatch, FlightError> {
        self.flight.send(&self.name, spec)
    }

    /// See [`SingleFlight::abort`].
    pub fn abort(&self) -> bool {
        self.flight.abort(&self.name)
    }

    /// See [`SingleFlight::is_busy`].
    pub fn is_busy(&self) -> bool {
        self.flight.is_busy(&self.name)
    }
}
