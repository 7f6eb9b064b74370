//! # HTTP Retrieval Utilities
//!
//! An asynchronous [`Transport`] over `reqwest`. Requests are joined onto a base
//! URL, carry an optional bearer token and always expect a JSON answer, which
//! is what the classification layer reads.

use std::fmt;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Response;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use serde_json::Value;
use url::Url;

use super::transport::{Transport, TransportError, TransportRequest};

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware` so that retry or tracing layers can be
/// stacked by the caller (see [`ApiClient::with_middleware`]); the client itself
/// adds none.
#[derive(Clone)]
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
}

impl ApiClient {
    /// Creates a client for `base_url` with no request timeout.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidUrl`] if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, auth_token, None)
    }

    /// Creates a client whose requests give up after `timeout`.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidUrl`] for a bad base URL and
    /// [`TransportError::Network`] if the TLS backend cannot be initialised.
    pub fn with_timeout(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let url = Url::parse(base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(limit) = timeout {
            builder = builder.timeout(limit);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self::with_middleware(ClientBuilder::new(client).build(), url, auth_token))
    }

    /// Wraps an already configured middleware client.
    pub fn with_middleware(inner: ClientWithMiddleware, base_url: Url, auth_token: Option<String>) -> Self {
        Self {
            inner,
            base_url,
            auth_token,
        }
    }

    /// The URL relative request paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds the outgoing request without sending it.
    fn prepare(&self, request: &TransportRequest) -> Result<RequestBuilder, TransportError> {
        // 1. Construct the full absolute URL
        let mut url = self
            .base_url
            .join(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        // 2. Bodiless verbs carry their data in the query string
        if request.uses_query() && !request.data.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.data {
                pairs.append_pair(key, &query_value(value));
            }
        }

        let mut req = self
            .inner
            .request(request.method.clone(), url)
            .header(ACCEPT, "application/json");

        // 3. Inject Bearer Authentication if a token is present
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        // 4. Everything else sends its data as a JSON body
        if !request.uses_query() {
            let body = serde_json::to_string(&request.data)
                .map_err(|e| TransportError::Parse(e.to_string()))?;
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }

        Ok(req)
    }

    /// Sends `request` and parses the JSON answer.
    ///
    /// # Errors
    /// Non-2xx answers become [`TransportError::Status`]; see [`TransportError`]
    /// for the remaining cases.
    pub async fn request(&self, request: TransportRequest) -> Result<Value, TransportError> {
        self.execute(request).await
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Transport for ApiClient {
    fn execute(&self, request: TransportRequest) -> BoxFuture<'static, Result<Value, TransportError>> {
        let prepared = self.prepare(&request);
        let method = request.method;
        let path = request.url;

        async move {
            let builder = prepared?;
            tracing::debug!(%method, url = %path, "sending request");
            let response = builder.send().await.map_err(from_middleware)?;
            read_payload(response).await
        }
        .boxed()
    }
}

/// Turns a response into a payload or a status failure.
async fn read_payload(response: Response) -> Result<Value, TransportError> {
    let status = response.status();
    if !status.is_success() {
        // Capture the error body as a string for debugging
        let body = response.text().await.ok();
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text().await.map_err(from_reqwest)?;
    serde_json::from_str(&text).map_err(|e| TransportError::Parse(e.to_string()))
}

fn from_middleware(err: reqwest_middleware::Error) -> TransportError {
    match err {
        reqwest_middleware::Error::Reqwest(e) => from_reqwest(e),
        other => TransportError::Network(other.to_string()),
    }
}

fn from_reqwest(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Strings go out verbatim, null as empty, everything else as its JSON text.
fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
