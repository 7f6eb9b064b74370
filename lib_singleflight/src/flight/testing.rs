//! Test doubles for the request controller.

use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::retrieve::{Transport, TransportError, TransportRequest};

use super::spec::{ErrorEvent, RequestSpec};

type Reply = Result<Value, TransportError>;

struct PendingCall {
    request: TransportRequest,
    responder: Option<oneshot::Sender<Reply>>,
}

/// Records every request and leaves it pending until the test answers it.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    calls: Arc<Mutex<Vec<PendingCall>>>,
}

impl MockTransport {
    pub(crate) fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<TransportRequest> {
        self.calls.lock().unwrap().iter().map(|c| c.request.clone()).collect()
    }

    /// Answers call `index`. False if the caller already dropped the request.
    pub(crate) fn respond(&self, index: usize, reply: Reply) -> bool {
        let responder = self.calls.lock().unwrap()[index].responder.take();
        match responder {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// True once the controller dropped the future of call `index`.
    pub(crate) fn was_dropped(&self, index: usize) -> bool {
        self.calls.lock().unwrap()[index]
            .responder
            .as_ref()
            .map_or(true, |tx| tx.is_closed())
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: TransportRequest) -> BoxFuture<'static, Reply> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(PendingCall {
            request,
            responder: Some(tx),
        });
        async move {
            rx.await
                .unwrap_or_else(|_| Err(TransportError::Network("mock responder dropped".into())))
        }
        .boxed()
    }
}

/// An ordered log of callback invocations.
#[derive(Clone, Default)]
pub(crate) struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub(crate) fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub(crate) fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Installs success, permission, error and completion callbacks tagged with `tag`.
    pub(crate) fn wire(&self, tag: &str, spec: RequestSpec) -> RequestSpec {
        let (success, permission, error, complete) = (self.clone(), self.clone(), self.clone(), self.clone());
        let (t1, t2, t3, t4) = (tag.to_string(), tag.to_string(), tag.to_string(), tag.to_string());

        spec.on_success(move |_| success.push(format!("{}:success", t1)))
            .on_permission(move |_| permission.push(format!("{}:permission", t2)))
            .on_error(move |e| {
                let detail = match e {
                    ErrorEvent::Rejected(_) => "rejected".to_string(),
                    ErrorEvent::Transport(t) => format!(
                        "transport:{}",
                        t.status().map_or_else(|| "-".to_string(), |s| s.to_string())
                    ),
                };
                error.push(format!("{}:error:{}", t3, detail));
            })
            .on_complete(move |s| complete.push(format!("{}:complete:{:?}", t4, s)))
    }
}
