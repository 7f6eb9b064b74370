//! # Transport Seam
//!
//! A [`Transport`] issues one request and resolves to the parsed payload or a
//! [`TransportError`]. Cancellation is expressed by dropping the returned
//! future, which is what the controller does when a request is superseded or
//! aborted.

use futures_util::future::BoxFuture;
use reqwest::Method;
use serde_json::{Map, Value};
use thiserror::Error;

/// Everything the network needs to know about a request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// HTTP verb.
    pub method: Method,
    /// Resource identifier, absolute or relative to the transport's base URL.
    pub url: String,
    /// Request parameters: query pairs for bodiless verbs, a JSON body otherwise.
    pub data: Map<String, Value>,
}

impl TransportRequest {
    /// True for verbs that carry their parameters in the query string.
    pub fn uses_query(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD | Method::DELETE)
    }
}

/// Why a request produced no payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request was cancelled on purpose. Never surfaced as a failure.
    #[error("request aborted")]
    Aborted,

    /// The transport gave up waiting for a response.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP status {status}")]
    Status {
        /// Numeric status code.
        status: u16,
        /// Raw response body, when one could be read.
        body: Option<String>,
    },

    /// A 2xx response whose body was not valid JSON.
    #[error("response body is not valid JSON: {0}")]
    Parse(String),

    /// The request URL could not be built.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// Connection, DNS, TLS or middleware failure.
    #[error("network failure: {0}")]
    Network(String),
}

impl TransportError {
    /// The abort-status check: intentional cancellation is not an error.
    pub fn is_aborted(&self) -> bool {
        matches!(self, TransportError::Aborted)
    }

    /// The HTTP status associated with the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Issues requests on behalf of the controller.
pub trait Transport: Send + Sync + 'static {
    /// Starts `request`. Dropping the returned future must cancel it.
    fn execute(&self, request: TransportRequest) -> BoxFuture<'static, Result<Value, TransportError>>;
}
