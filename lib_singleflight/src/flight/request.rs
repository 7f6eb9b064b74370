//! # Request Task
//!
//! Runs one issued request to completion: races the transport against the
//! handle's cancellation token, classifies the payload and routes the outcome
//! to the request's callbacks or to the controller defaults. The completion
//! callback always runs last.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::classify::{classify, Outcome, RuleOverrides};
use crate::retrieve::{Transport, TransportError, TransportRequest};

use super::defaults::FlightDefaults;
use super::handle::RequestHandle;
use super::spec::{Callbacks, ErrorCallback, ErrorEvent, Settlement};

pub(crate) struct Launch {
    pub(crate) handle: RequestHandle,
    pub(crate) request: TransportRequest,
    pub(crate) rules: RuleOverrides,
    pub(crate) callbacks: Callbacks,
}

impl Launch {
    /// Hands the request to the transport and spawns its task on `runtime`.
    ///
    /// `on_settle` runs as soon as the outcome is known, before the final
    /// cancellation check and before any callback, so that a callback issuing
    /// the same request again is not suppressed. It must run under the same
    /// lock `send` cancels under.
    pub(crate) fn spawn<F>(
        self,
        runtime: &Handle,
        transport: &Arc<dyn Transport>,
        defaults: Arc<FlightDefaults>,
        on_settle: F,
    ) where
        F: FnOnce(&RequestHandle) + Send + 'static,
    {
        let Launch {
            handle,
            request,
            rules,
            callbacks,
        } = self;

        let response = transport.execute(request);

        runtime.spawn(async move {
            let _settled = handle.settle_guard();
            let token = handle.cancellation().clone();

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(TransportError::Aborted),
                result = response => result,
            };
            // Release first: once the slot no longer points at this handle no
            // later send can cancel it, so the check below is final.
            on_settle(&handle);
            let result = if token.is_cancelled() {
                Err(TransportError::Aborted)
            } else {
                result
            };

            let Callbacks {
                success,
                permission,
                error,
                complete,
            } = callbacks;

            let settlement = match result {
                Ok(payload) => match classify(&payload, &rules, &defaults.rules()) {
                    Outcome::Success => {
                        if let Some(callback) = success {
                            callback(payload);
                        }
                        Settlement::Success
                    }
                    Outcome::PermissionDenied => {
                        match permission {
                            Some(callback) => callback(payload),
                            None => defaults.no_permission(&payload),
                        }
                        Settlement::PermissionDenied
                    }
                    Outcome::Failure => {
                        report(error, &defaults, ErrorEvent::Rejected(payload));
                        Settlement::Rejected
                    }
                },
                Err(e) if e.is_aborted() => {
                    tracing::debug!(request_id = handle.id(), url = handle.url(), "request aborted");
                    Settlement::Aborted
                }
                Err(e) => {
                    tracing::debug!(request_id = handle.id(), url = handle.url(), error = %e, "transport failure");
                    report(error, &defaults, ErrorEvent::Transport(e));
                    Settlement::TransportFailure
                }
            };

            if let Some(callback) = complete {
                callback(settlement);
            }
        });
    }
}

fn report(callback: Option<ErrorCallback>, defaults: &FlightDefaults, event: ErrorEvent) {
    match callback {
        Some(callback) => callback(event),
        None => defaults.error(&event),
    }
}
