//! Observe relations delivered to caller-supplied handlers.
//!
//! Registration is bounded by the client's timeout; the relation itself is
//! not. Once registered, every notification the peer pushes is handed to the
//! handler once, on a dedicated task, in arrival order, independent of any
//! request/response exchanges running over the same endpoint. A handler that
//! lags past the endpoint's buffer loses notifications; see [`Subscription`].
//!
//! # Example
//!
//! ```rust,ignore
//! let subscription = client
//!     .observe(&resource::uri(host, "15001/65537"), |notification| {
//!         println!("{}", notification.payload_string());
//!     })
//!     .await?;
//!
//! // ... later
//! subscription.cancel();
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::Error;
use crate::exchange::TimeoutCell;
use crate::message::{Request, Response};
use crate::transport::{Connector, Endpoint, TransportManager};

// ── Subscription ─────────────────────────────────────────────────────

/// Handle to a live observe relation.
///
/// Dropping the handle cancels the relation. It also ends on its own when
/// the endpoint it was registered on is shut down or replaced.
///
/// Notifications queue in a bounded buffer between the endpoint and the
/// handler (64 on the DTLS endpoint). If the handler falls that far
/// behind, newer notifications are dropped with a warning until it
/// catches up; the relation itself stays open. Observe notifications carry
/// full resource state, so the next delivered one supersedes any lost.
pub struct Subscription {
    uri: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Stop delivering notifications. A handler call already in progress
    /// runs to completion; no further calls are made.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `true` once the delivery task has exited, whether through
    /// cancellation or because the transport closed the relation.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("uri", &self.uri)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ── SubscriptionManager ──────────────────────────────────────────────

/// Opens observe relations against the current endpoint.
pub struct SubscriptionManager<C: Connector> {
    transport: Arc<TransportManager<C>>,
    timeout: Arc<TimeoutCell>,
}

impl<C: Connector> SubscriptionManager<C> {
    pub(crate) fn new(transport: Arc<TransportManager<C>>, timeout: Arc<TimeoutCell>) -> Self {
        Self { transport, timeout }
    }

    /// Register an observe relation on `uri` and deliver every
    /// notification to `handler`.
    ///
    /// Fails once, up front, when there is no active transport or the
    /// registration is not answered in time. The handler is never called
    /// in that case.
    pub async fn observe<F>(&self, uri: &str, handler: F) -> Result<Subscription, Error>
    where
        F: FnMut(Response) + Send + 'static,
    {
        let timeout = self.timeout.get();

        let register = async {
            let endpoint = self.transport.current().await?;
            endpoint.observe(Request::observe(uri)).await
        };

        let notifications = tokio::time::timeout(timeout, register)
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })??;

        debug!(uri, "observe relation established");

        let cancel = CancellationToken::new();
        let task = tokio::spawn(deliver(
            uri.to_owned(),
            notifications,
            handler,
            cancel.clone(),
        ));

        Ok(Subscription {
            uri: uri.to_owned(),
            cancel,
            task,
        })
    }
}

/// Forward notifications to the handler until cancelled or closed.
async fn deliver<F>(
    uri: String,
    mut notifications: mpsc::Receiver<Response>,
    mut handler: F,
    cancel: CancellationToken,
) where
    F: FnMut(Response),
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(uri = %uri, "observe relation cancelled");
                break;
            }
            next = notifications.recv() => match next {
                Some(notification) => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    trace!(uri = %uri, seq = ?notification.observe, "notification");
                    handler(notification);
                }
                None => {
                    debug!(uri = %uri, "observe relation closed by transport");
                    break;
                }
            }
        }
    }
}
