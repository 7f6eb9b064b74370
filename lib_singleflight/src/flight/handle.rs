use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// A live view of one issued request.
///
/// Clones share state. Cancelling is cooperative: the request task observes the
/// token, drops the transport future and reports [`Settlement::Aborted`]
/// without touching the error path.
///
/// [`Settlement::Aborted`]: super::Settlement::Aborted
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: u64,
    url: Arc<str>,
    cancel: CancellationToken,
    done: CancellationToken,
}

impl RequestHandle {
    pub(crate) fn new(id: u64, url: &str) -> Self {
        Self {
            id,
            url: Arc::from(url),
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    /// Identifier, unique per controller.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The resource this request was issued for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requests cancellation. Has no effect once the request has settled.
    pub fn cancel(&self) {
        if !self.is_settled() {
            self.cancel.cancel();
        }
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once every callback of the request has run.
    pub fn is_settled(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Waits until the request has settled.
    pub async fn settled(&self) {
        self.done.cancelled().await
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn settle_guard(&self) -> SettleGuard {
        SettleGuard(self.done.clone())
    }
}

/// Marks the handle settled when dropped, even if a callback panicked.
pub(crate) struct SettleGuard(CancellationToken);

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// What `send` did.
#[must_use]
#[derive(Debug, Clone)]
pub enum Dispatch {
    /// A request went to the transport.
    Issued(RequestHandle),
    /// An identical request is already in flight on the channel; nothing was sent.
    Suppressed,
    /// The pre-send gate declined; nothing was sent and nothing changed.
    Vetoed,
}

impl Dispatch {
    /// The issued handle, if any.
    pub fn handle(&self) -> Option<&RequestHandle> {
        match self {
            Dispatch::Issued(handle) => Some(handle),
            _ => None,
        }
    }

    /// Consumes the dispatch, keeping the issued handle.
    pub fn into_handle(self) -> Option<RequestHandle> {
        match self {
            Dispatch::Issued(handle) => Some(handle),
            _ => None,
        }
    }

    /// True if a request was issued.
    pub fn is_issued(&self) -> bool {
        matches!(self, Dispatch::Issued(_))
    }
}
