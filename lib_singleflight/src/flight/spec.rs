//! # Request Specification
//!
//! What a caller hands to a channel: where to go, with which parameters, how
//! to read the answer and whom to tell about it.

use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::classify::{Rule, RuleOverrides};
use crate::retrieve::TransportError;

use super::registry::FlightError;

/// Pre-send gate. Returning `false` vetoes the request.
pub type Gate = Box<dyn FnOnce() -> bool + Send>;
/// Receives the payload of a successful or permission-denied response.
pub type PayloadCallback = Box<dyn FnOnce(Value) + Send>;
/// Receives a classified or transport failure.
pub type ErrorCallback = Box<dyn FnOnce(ErrorEvent) + Send>;
/// Runs once per issued request, after every other callback.
pub type CompleteCallback = Box<dyn FnOnce(Settlement) + Send>;

/// What the error reaction is told.
#[derive(Debug, Clone, Error)]
pub enum ErrorEvent {
    /// A payload arrived but neither the success nor the permission rule accepted it.
    #[error("server rejected the request: {0}")]
    Rejected(Value),
    /// No payload arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// How an issued request ended, as reported to the completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Classified as success.
    Success,
    /// Classified as permission denied.
    PermissionDenied,
    /// Payload classified as failure.
    Rejected,
    /// The transport failed for a reason other than cancellation.
    TransportFailure,
    /// Cancelled by `abort` or by a superseding request.
    Aborted,
}

/// The part of a request that decides whether two sends are the same.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestIdentity {
    /// Resource identifier.
    pub url: String,
    /// Request parameters.
    pub data: Map<String, Value>,
}

impl RequestIdentity {
    /// True when `next` asks for the same thing as `self`.
    ///
    /// URLs must be equal. Only the keys of `next` are compared: each must be
    /// present in `self` with an identical value. Keys that only `self` carries
    /// are ignored, so the relation is deliberately asymmetric.
    pub fn matches(&self, next: &RequestIdentity) -> bool {
        self.url == next.url
            && next
                .data
                .iter()
                .all(|(key, value)| self.data.get(key) == Some(value))
    }
}

#[derive(Default)]
pub(crate) struct Callbacks {
    pub(crate) success: Option<PayloadCallback>,
    pub(crate) permission: Option<PayloadCallback>,
    pub(crate) error: Option<ErrorCallback>,
    pub(crate) complete: Option<CompleteCallback>,
}

/// A request plus its rule overrides and lifecycle callbacks.
///
/// ```ignore
/// let spec = RequestSpec::get("/api/list")
///     .data("q", 1)
///     .on_success(|payload| println!("{payload}"))
///     .on_complete(|settled| println!("done: {settled:?}"));
/// ```
pub struct RequestSpec {
    method: Method,
    identity: RequestIdentity,
    rules: RuleOverrides,
    before: Option<Gate>,
    callbacks: Callbacks,
}

pub(crate) struct RequestParts {
    pub(crate) method: Method,
    pub(crate) identity: RequestIdentity,
    pub(crate) rules: RuleOverrides,
    pub(crate) before: Option<Gate>,
    pub(crate) callbacks: Callbacks,
}

impl RequestSpec {
    /// A GET request for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            identity: RequestIdentity {
                url: url.into(),
                data: Map::new(),
            },
            rules: RuleOverrides::default(),
            before: None,
            callbacks: Callbacks::default(),
        }
    }

    /// Same as [`RequestSpec::new`].
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url)
    }

    /// A POST request for `url`.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(url).method(Method::POST)
    }

    /// Sets the HTTP verb. The verb is not part of the request identity.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds one request parameter.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.identity.data.insert(key.into(), value.into());
        self
    }

    /// Replaces all request parameters.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.identity.data = data;
        self
    }

    /// Installs a pre-send gate; `false` vetoes the send with no side effects.
    pub fn before<F>(mut self, gate: F) -> Self
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        self.before = Some(Box::new(gate));
        self
    }

    /// Called with the payload when the response classifies as success.
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.callbacks.success = Some(Box::new(callback));
        self
    }

    /// Called with the payload on permission denied, instead of the default action.
    pub fn on_permission<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.callbacks.permission = Some(Box::new(callback));
        self
    }

    /// Called on failure, instead of the default action. Never called for aborts.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(ErrorEvent) + Send + 'static,
    {
        self.callbacks.error = Some(Box::new(callback));
        self
    }

    /// Called exactly once when an issued request settles, aborts included.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Settlement) + Send + 'static,
    {
        self.callbacks.complete = Some(Box::new(callback));
        self
    }

    /// Overrides the success rule for this request only.
    pub fn success_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let rule: Rule = Arc::new(rule);
        self.rules.success = Some(rule);
        self
    }

    /// Overrides the permission rule for this request only.
    pub fn permission_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let rule: Rule = Arc::new(rule);
        self.rules.permission = Some(rule);
        self
    }

    /// Replaces both rule overrides at once.
    pub fn rules(mut self, rules: RuleOverrides) -> Self {
        self.rules = rules;
        self
    }

    /// Resource identifier.
    pub fn url(&self) -> &str {
        &self.identity.url
    }

    /// HTTP verb.
    pub fn http_method(&self) -> &Method {
        &self.method
    }

    /// URL and parameters, as used for duplicate detection.
    pub fn identity(&self) -> &RequestIdentity {
        &self.identity
    }

    pub(crate) fn validate(&self) -> Result<(), FlightError> {
        if self.identity.url.trim().is_empty() {
            return Err(FlightError::MissingUrl);
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> RequestParts {
        RequestParts {
            method: self.method,
            identity: self.identity,
            rules: self.rules,
            before: self.before,
            callbacks: self.callbacks,
        }
    }
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpec")
            .field("method", &self.method)
            .field("identity", &self.identity)
            .field("rules", &self.rules)
            .field("before", &self.before.is_some())
            .finish_non_exhaustive()
    }
}
