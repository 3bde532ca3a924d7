// ── Exchange dispatcher ──
//
// One request, one response, one timeout. The payload is encoded before
// the transport is touched, so an encoding failure never puts bytes on
// the wire. The timeout covers everything after that point, including
// the brief wait for the transport lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::error::Error;
use crate::message::{Method, Request};
use crate::shape::{ResponseShape, encode_payload};
use crate::transport::{Connector, Endpoint, TransportManager};

/// Default wait for a response, matching the gateway's slowest replies.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Request timeout shared by the dispatcher and the subscription manager.
///
/// Read once per operation; changing it never affects a request that is
/// already waiting.
#[derive(Debug)]
pub(crate) struct TimeoutCell {
    millis: AtomicU64,
}

impl TimeoutCell {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            millis: AtomicU64::new(duration_to_millis(timeout)),
        }
    }

    pub(crate) fn get(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, timeout: Duration) {
        self.millis
            .store(duration_to_millis(timeout), Ordering::Relaxed);
    }
}

fn duration_to_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Performs timeout-bounded request/response exchanges.
pub struct Dispatcher<C: Connector> {
    transport: Arc<TransportManager<C>>,
    timeout: Arc<TimeoutCell>,
}

impl<C: Connector> Dispatcher<C> {
    pub(crate) fn new(transport: Arc<TransportManager<C>>, timeout: Arc<TimeoutCell>) -> Self {
        Self { transport, timeout }
    }

    /// Run one exchange and convert the response with `shape`.
    ///
    /// Response codes are not interpreted: an error body is handed to
    /// `shape` like any other.
    pub async fn exchange<P, S>(
        &self,
        method: Method,
        uri: &str,
        payload: Option<&P>,
        shape: &S,
    ) -> Result<S::Output, Error>
    where
        P: Serialize + ?Sized,
        S: ResponseShape,
    {
        let mut request = Request::new(method, uri);
        if let Some(payload) = payload {
            request = request.with_json(encode_payload(payload)?);
        }

        let timeout = self.timeout.get();
        debug!(%method, uri, timeout_ms = duration_to_millis(timeout), "sending request");

        let send = async {
            let endpoint = self.transport.current().await?;
            endpoint.exchange(request).await
        };

        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: duration_to_millis(timeout),
            })??;

        debug!(
            %method,
            uri,
            status = %response.status,
            bytes = response.payload.len(),
            "response received"
        );

        shape.decode(&response.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_cell_round_trips_millis() {
        let cell = TimeoutCell::new(DEFAULT_TIMEOUT);
        assert_eq!(cell.get(), Duration::from_secs(20));

        cell.set(Duration::from_millis(50));
        assert_eq!(cell.get(), Duration::from_millis(50));
    }

    #[test]
    fn oversized_timeout_saturates() {
        let cell = TimeoutCell::new(Duration::MAX);
        assert_eq!(cell.get(), Duration::from_millis(u64::MAX));
    }
}
