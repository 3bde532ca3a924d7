// ── CoapClient ──
//
// Public face of the crate: credentials, timeout, get/post/put, observe.
// Composes the credential store, transport manager, dispatcher, and
// subscription manager, which share the transport through an explicit
// `Arc` rather than any process-wide registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::credentials::{CredentialStore, Credentials};
use crate::dtls::DtlsConnector;
use crate::error::Error;
use crate::exchange::{DEFAULT_TIMEOUT, Dispatcher, TimeoutCell};
use crate::message::{Method, Response};
use crate::observe::{Subscription, SubscriptionManager};
use crate::shape::ResponseShape;
use crate::transport::{
    Connector, GatewayResolver, SECURE_PORT, StaticGateway, TransportManager, TransportState,
};

/// Connection tuning for a [`CoapClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway port, 5684 unless testing against something else.
    pub port: u16,
    /// Local bind address; `None` binds an ephemeral port on the wildcard
    /// address of the gateway's family.
    pub local_addr: Option<SocketAddr>,
    /// Initial request timeout, also bounding each handshake.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: SECURE_PORT,
            local_addr: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Secure CoAP client for a single gateway.
///
/// Cheaply cloneable; all clones share one credential pair, one timeout,
/// and one secured endpoint.
pub struct CoapClient<C: Connector = DtlsConnector> {
    inner: Arc<ClientInner<C>>,
}

struct ClientInner<C: Connector> {
    credentials: CredentialStore,
    timeout: Arc<TimeoutCell>,
    transport: Arc<TransportManager<C>>,
    dispatcher: Dispatcher<C>,
    subscriptions: SubscriptionManager<C>,
}

impl<C: Connector> Drop for ClientInner<C> {
    fn drop(&mut self) {
        // The last handle is gone; release the endpoint without blocking.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let transport = Arc::clone(&self.transport);
        runtime.spawn(async move { transport.shutdown().await });
    }
}

impl<C: Connector> Clone for CoapClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl CoapClient<DtlsConnector> {
    /// Client for the gateway at `host` over DTLS with default settings.
    pub fn dtls(host: impl Into<String>) -> Self {
        Self::new(DtlsConnector, StaticGateway::new(host))
    }
}

impl<C: Connector> CoapClient<C> {
    pub fn new(connector: C, resolver: impl GatewayResolver) -> Self {
        Self::with_config(connector, resolver, &ClientConfig::default())
    }

    pub fn with_config(connector: C, resolver: impl GatewayResolver, config: &ClientConfig) -> Self {
        let timeout = Arc::new(TimeoutCell::new(config.timeout));
        let mut transport = TransportManager::new(
            connector,
            Arc::new(resolver),
            config.port,
            Arc::clone(&timeout),
        );
        if let Some(local) = config.local_addr {
            transport = transport.with_local_addr(local);
        }
        let transport = Arc::new(transport);

        Self {
            inner: Arc::new(ClientInner {
                credentials: CredentialStore::default(),
                dispatcher: Dispatcher::new(Arc::clone(&transport), Arc::clone(&timeout)),
                subscriptions: SubscriptionManager::new(Arc::clone(&transport), Arc::clone(&timeout)),
                timeout,
                transport,
            }),
        }
    }

    // ── Credentials ──────────────────────────────────────────────

    /// The credentials most recently set, if any.
    pub fn credentials(&self) -> Option<Arc<Credentials>> {
        self.inner.credentials.get()
    }

    /// Replace the credentials and rebuild the secured endpoint.
    ///
    /// Returns once the new endpoint is installed, the handshake fails or
    /// times out, or a newer call supersedes this one.
    ///
    /// Never fails: a rebuild error is logged and published through
    /// [`transport_state`](Self::transport_state), and subsequent
    /// exchanges fail fast until credentials are set again. Use
    /// [`try_set_credentials`](Self::try_set_credentials) to get the
    /// error directly.
    pub async fn set_credentials(&self, credentials: Credentials) {
        if let Err(e) = self.try_set_credentials(credentials).await {
            warn!(error = %e, "credentials stored but no secured endpoint is active");
        }
    }

    /// Like [`set_credentials`](Self::set_credentials), returning the
    /// rebuild outcome. The credentials are kept either way.
    pub async fn try_set_credentials(&self, credentials: Credentials) -> Result<(), Error> {
        debug!(identity = credentials.identity(), "credentials replaced");
        self.inner.credentials.set(credentials);
        self.inner.transport.rebuild(&self.inner.credentials).await
    }

    /// Subscribe to secured endpoint lifecycle changes.
    pub fn transport_state(&self) -> watch::Receiver<TransportState> {
        self.inner.transport.state()
    }

    // ── Timeout ──────────────────────────────────────────────────

    pub fn timeout(&self) -> Duration {
        self.inner.timeout.get()
    }

    /// Change the wait applied to future exchanges and observe
    /// registrations. In-flight requests keep the value they started with.
    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.timeout.set(timeout);
    }

    // ── Exchanges ────────────────────────────────────────────────

    /// One exchange with full error reporting.
    ///
    /// Unlike [`get`](Self::get)/[`post`](Self::post)/[`put`](Self::put),
    /// this tells a timeout apart from a decode failure or a missing
    /// transport.
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
        self.inner
            .dispatcher
            .exchange(method, uri, payload, shape)
            .await
    }

    /// GET `uri`. `None` on timeout, transport failure, or decode failure.
    pub async fn get<S: ResponseShape>(&self, uri: &str, shape: S) -> Option<S::Output> {
        self.settle(Method::Get, uri, None::<&()>, &shape).await
    }

    /// POST `payload` as JSON to `uri`. `None` on any failure, including
    /// a payload that cannot be encoded (nothing is sent in that case).
    pub async fn post<P, S>(&self, uri: &str, payload: &P, shape: S) -> Option<S::Output>
    where
        P: Serialize + ?Sized,
        S: ResponseShape,
    {
        self.settle(Method::Post, uri, Some(payload), &shape).await
    }

    /// PUT `payload` as JSON to `uri`. Same failure rules as [`post`](Self::post).
    pub async fn put<P, S>(&self, uri: &str, payload: &P, shape: S) -> Option<S::Output>
    where
        P: Serialize + ?Sized,
        S: ResponseShape,
    {
        self.settle(Method::Put, uri, Some(payload), &shape).await
    }

    async fn settle<P, S>(
        &self,
        method: Method,
        uri: &str,
        payload: Option<&P>,
        shape: &S,
    ) -> Option<S::Output>
    where
        P: Serialize + ?Sized,
        S: ResponseShape,
    {
        match self.exchange(method, uri, payload, shape).await {
            Ok(output) => Some(output),
            Err(e) => {
                debug!(%method, uri, error = %e, "exchange yielded no result");
                None
            }
        }
    }

    // ── Observe ──────────────────────────────────────────────────

    /// Open an observe relation on `uri`; see [`SubscriptionManager::observe`].
    pub async fn observe<F>(&self, uri: &str, handler: F) -> Result<Subscription, Error>
    where
        F: FnMut(Response) + Send + 'static,
    {
        self.inner.subscriptions.observe(uri, handler).await
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Shut the secured endpoint down and abandon any rebuild still
    /// connecting. Credentials are kept; setting them again brings the
    /// endpoint back. Dropping the last clone does the same in the
    /// background.
    pub async fn close(&self) {
        self.inner.transport.shutdown().await;
    }
}
