// ── Secured transport management ──
//
// Owns the single secured endpoint the client talks through. Consumers
// (dispatcher, subscriptions) never look the endpoint up globally: they
// hold an `Arc<TransportManager>` and clone the current handle under its
// lock at the moment they issue a request.

use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use secrecy::SecretSlice;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::credentials::{CredentialStore, Credentials};
use crate::error::Error;
use crate::exchange::TimeoutCell;
use crate::message::{Request, Response};

/// Well-known CoAP-over-DTLS port.
pub const SECURE_PORT: u16 = 5684;

// ── Endpoint seams ───────────────────────────────────────────────────

/// A live, credential-bound session with one peer.
///
/// Implementations correlate responses to requests themselves; callers
/// only see one future per exchange.
pub trait Endpoint: Send + Sync + 'static {
    /// Send a one-shot request and wait (unbounded) for its response.
    fn exchange(&self, request: Request) -> impl Future<Output = Result<Response, Error>> + Send;

    /// Register an observe relation. Resolves once the peer has answered
    /// the registration; that first answer is the first item on the
    /// returned channel. Dropping the receiver ends the relation.
    fn observe(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<mpsc::Receiver<Response>, Error>> + Send;

    /// Stop all I/O, fail outstanding waiters, and release the socket.
    fn shutdown(&self) -> impl Future<Output = ()> + Send;
}

/// Builds and starts endpoints from an [`EndpointConfig`].
pub trait Connector: Send + Sync + 'static {
    type Endpoint: Endpoint;

    fn connect(
        &self,
        config: EndpointConfig,
    ) -> impl Future<Output = Result<Self::Endpoint, Error>> + Send;
}

/// Supplies the gateway host. Consulted on every rebuild, never per request.
pub trait GatewayResolver: Send + Sync + 'static {
    fn gateway_host(&self) -> Result<String, Error>;
}

impl<F> GatewayResolver for F
where
    F: Fn() -> Result<String, Error> + Send + Sync + 'static,
{
    fn gateway_host(&self) -> Result<String, Error> {
        self()
    }
}

/// A gateway at a fixed host name or IP address.
#[derive(Debug, Clone)]
pub struct StaticGateway {
    host: String,
}

impl StaticGateway {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl GatewayResolver for StaticGateway {
    fn gateway_host(&self) -> Result<String, Error> {
        Ok(self.host.clone())
    }
}

// ── EndpointConfig ───────────────────────────────────────────────────

/// The single entry of an endpoint's pre-shared-key table.
#[derive(Debug)]
pub struct PskEntry {
    pub peer: SocketAddr,
    pub identity: String,
    pub key: SecretSlice<u8>,
}

/// Everything a [`Connector`] needs to bring up one endpoint.
#[derive(Debug)]
pub struct EndpointConfig {
    /// Local bind address, normally an ephemeral port of the peer's family.
    pub local: SocketAddr,
    pub peer: SocketAddr,
    pub psk: PskEntry,
}

// ── TransportState ───────────────────────────────────────────────────

/// Outcome of the most recent rebuild, observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    /// No credentials set yet, or the client was closed.
    Inactive,
    Connecting,
    Active { peer: SocketAddr },
    /// The last rebuild failed; exchanges fail fast until the next one.
    Failed { reason: String },
}

// ── TransportManager ─────────────────────────────────────────────────

/// Maintains at most one secured endpoint reflecting the current credentials.
pub struct TransportManager<C: Connector> {
    connector: C,
    resolver: Arc<dyn GatewayResolver>,
    port: u16,
    local: Option<SocketAddr>,
    timeout: Arc<TimeoutCell>,
    slot: Mutex<Slot<C::Endpoint>>,
    state: watch::Sender<TransportState>,
}

struct Slot<E> {
    endpoint: Option<Arc<E>>,
    /// Cancelled when a newer rebuild or a shutdown takes over the build in flight.
    connecting: CancellationToken,
}

impl<C: Connector> TransportManager<C> {
    pub(crate) fn new(
        connector: C,
        resolver: Arc<dyn GatewayResolver>,
        port: u16,
        timeout: Arc<TimeoutCell>,
    ) -> Self {
        let (state, _) = watch::channel(TransportState::Inactive);
        Self {
            connector,
            resolver,
            port,
            local: None,
            timeout,
            slot: Mutex::new(Slot {
                endpoint: None,
                connecting: CancellationToken::new(),
            }),
            state,
        }
    }

    /// Override the local bind address. By default an ephemeral port on the
    /// unspecified address of the peer's family.
    pub fn with_local_addr(mut self, local: SocketAddr) -> Self {
        self.local = Some(local);
        self
    }

    /// Tear down the current endpoint and build a fresh one from the
    /// credentials in `store`.
    ///
    /// Teardown and install happen under the slot lock, so no request can
    /// pick up a half-destroyed endpoint. The handshake in between runs
    /// without it: requests fail fast with [`Error::NoTransport`] meanwhile,
    /// and a later rebuild or [`shutdown`](Self::shutdown) abandons it with
    /// [`Error::Superseded`]. The handshake is bounded by the client timeout.
    ///
    /// Credentials are read after the lock is taken, so concurrent rebuilds
    /// always settle on the most recently stored value.
    pub async fn rebuild(&self, store: &CredentialStore) -> Result<(), Error> {
        let (credentials, connecting) = {
            let mut slot = self.slot.lock().await;
            slot.connecting.cancel();

            if let Some(previous) = slot.endpoint.take() {
                debug!("shutting down previous endpoint");
                previous.shutdown().await;
            }

            let Some(credentials) = store.get() else {
                self.state.send_replace(TransportState::Inactive);
                return Err(Error::NoCredentials);
            };

            slot.connecting = CancellationToken::new();
            self.state.send_replace(TransportState::Connecting);
            (credentials, slot.connecting.clone())
        };

        let timeout = self.timeout.get();
        let built = tokio::select! {
            biased;
            () = connecting.cancelled() => Err(Error::Superseded),
            built = tokio::time::timeout(timeout, self.build(&credentials)) => {
                built.unwrap_or_else(|_| Err(Error::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }))
            }
        };

        let mut slot = self.slot.lock().await;
        if connecting.is_cancelled() {
            if let Ok((endpoint, _)) = built {
                endpoint.shutdown().await;
            }
            debug!("rebuild superseded while connecting");
            return Err(Error::Superseded);
        }

        match built {
            Ok((endpoint, peer)) => {
                slot.endpoint = Some(Arc::new(endpoint));
                self.state.send_replace(TransportState::Active { peer });
                info!(%peer, identity = credentials.identity(), "secured endpoint installed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "secured endpoint rebuild failed");
                self.state.send_replace(TransportState::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Clone the handle of the installed endpoint.
    pub async fn current(&self) -> Result<Arc<C::Endpoint>, Error> {
        self.slot
            .lock()
            .await
            .endpoint
            .clone()
            .ok_or(Error::NoTransport)
    }

    /// Shut the endpoint down without replacing it. A rebuild still
    /// connecting is abandoned.
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        slot.connecting.cancel();
        if let Some(endpoint) = slot.endpoint.take() {
            endpoint.shutdown().await;
            debug!("secured endpoint shut down");
        }
        self.state.send_replace(TransportState::Inactive);
    }

    /// Subscribe to rebuild outcomes.
    pub fn state(&self) -> watch::Receiver<TransportState> {
        self.state.subscribe()
    }

    async fn build(&self, credentials: &Credentials) -> Result<(C::Endpoint, SocketAddr), Error> {
        let host = self.resolver.gateway_host()?;
        let peer = resolve(&host, self.port).await?;
        let local = self.local.unwrap_or_else(|| unspecified_for(peer));

        let config = EndpointConfig {
            local,
            peer,
            psk: PskEntry {
                peer,
                identity: credentials.identity().to_owned(),
                key: SecretSlice::from(credentials.key_bytes()),
            },
        };

        debug!(%peer, %local, "building secured endpoint");
        let endpoint = self.connector.connect(config).await?;
        Ok((endpoint, peer))
    }
}

/// Ephemeral port on the wildcard address matching the peer's family.
fn unspecified_for(peer: SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr, Error> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::Resolve {
            host: host.to_owned(),
            reason: e.to_string(),
        })?;

    addrs.next().ok_or_else(|| Error::Resolve {
        host: host.to_owned(),
        reason: "no addresses returned".into(),
    })
}
