// In-process stand-in for a gateway: a `Connector` whose endpoints record
// every lifecycle event and request, and answer from a scripted reply.
#![allow(dead_code, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::sync::mpsc;

use tradfri_coap::{Connector, Endpoint, EndpointConfig, Error, Request, Response, Status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect { endpoint: usize, identity: String },
    Shutdown { endpoint: usize },
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub endpoint: usize,
    pub identity: String,
    pub key: Vec<u8>,
    pub request: Request,
}

#[derive(Debug, Clone)]
pub enum Reply {
    Body(Vec<u8>),
    Silent,
}

#[derive(Debug)]
struct PeerState {
    events: Mutex<Vec<Event>>,
    sent: Mutex<Vec<Sent>>,
    configs: Mutex<Vec<(SocketAddr, SocketAddr, String)>>,
    reply: Mutex<Reply>,
    observers: Mutex<Vec<(usize, mpsc::Sender<Response>)>>,
    next_endpoint: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    fail_connect: AtomicBool,
    connect_delay: Mutex<Duration>,
}

/// Shared handle to the fake gateway. Clone it into the client as the
/// connector and keep a copy to drive and inspect it.
#[derive(Debug, Clone)]
pub struct MockPeer {
    state: Arc<PeerState>,
}

impl Default for MockPeer {
    fn default() -> Self {
        Self {
            state: Arc::new(PeerState {
                events: Mutex::new(Vec::new()),
                sent: Mutex::new(Vec::new()),
                configs: Mutex::new(Vec::new()),
                reply: Mutex::new(Reply::Body(b"{}".to_vec())),
                observers: Mutex::new(Vec::new()),
                next_endpoint: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
                max_live: AtomicUsize::new(0),
                fail_connect: AtomicBool::new(false),
                connect_delay: Mutex::new(Duration::ZERO),
            }),
        }
    }
}

impl MockPeer {
    pub fn reply_with(&self, reply: Reply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    pub fn reply_body(&self, body: &str) {
        self.reply_with(Reply::Body(body.as_bytes().to_vec()));
    }

    pub fn fail_connects(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn delay_connects(&self, delay: Duration) {
        *self.state.connect_delay.lock().unwrap() = delay;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.state.sent.lock().unwrap().clone()
    }

    /// `(local, peer, psk identity)` for every connect attempt.
    pub fn configs(&self) -> Vec<(SocketAddr, SocketAddr, String)> {
        self.state.configs.lock().unwrap().clone()
    }

    pub fn max_live_endpoints(&self) -> usize {
        self.state.max_live.load(Ordering::SeqCst)
    }

    pub fn live_endpoints(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Push a notification to every registered observer. Returns how many
    /// relations accepted it.
    pub fn notify(&self, body: &str) -> usize {
        let mut observers = self.state.observers.lock().unwrap();
        observers.retain(|(_, tx)| !tx.is_closed());
        observers
            .iter()
            .filter(|(_, tx)| tx.try_send(notification(body)).is_ok())
            .count()
    }
}

fn notification(body: &str) -> Response {
    let mut response = Response::new(Status::CONTENT, body.as_bytes().to_vec());
    response.observe = Some(1);
    response
}

impl Connector for MockPeer {
    type Endpoint = MockEndpoint;

    async fn connect(&self, config: EndpointConfig) -> Result<MockEndpoint, Error> {
        let delay = *self.state.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.state.configs.lock().unwrap().push((
            config.local,
            config.peer,
            config.psk.identity.clone(),
        ));

        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::Handshake("peer rejected identity".into()));
        }

        let id = self.state.next_endpoint.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live.fetch_max(live, Ordering::SeqCst);
        self.state.events.lock().unwrap().push(Event::Connect {
            endpoint: id,
            identity: config.psk.identity.clone(),
        });

        Ok(MockEndpoint {
            id,
            identity: config.psk.identity,
            key: config.psk.key.expose_secret().to_vec(),
            closed: AtomicBool::new(false),
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockEndpoint {
    id: usize,
    identity: String,
    key: Vec<u8>,
    closed: AtomicBool,
    state: Arc<PeerState>,
}

impl MockEndpoint {
    fn record(&self, request: &Request) -> Result<Reply, Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::Interrupted);
        }
        self.state.sent.lock().unwrap().push(Sent {
            endpoint: self.id,
            identity: self.identity.clone(),
            key: self.key.clone(),
            request: request.clone(),
        });
        Ok(self.state.reply.lock().unwrap().clone())
    }
}

impl Endpoint for MockEndpoint {
    async fn exchange(&self, request: Request) -> Result<Response, Error> {
        match self.record(&request)? {
            Reply::Body(body) => Ok(Response::new(Status::CONTENT, body)),
            Reply::Silent => std::future::pending().await,
        }
    }

    async fn observe(&self, request: Request) -> Result<mpsc::Receiver<Response>, Error> {
        assert!(request.observe, "observe must set the Observe option");
        let reply = self.record(&request)?;
        let Reply::Body(body) = reply else {
            return std::future::pending().await;
        };

        let (tx, rx) = mpsc::channel(16);
        tx.try_send(notification(&String::from_utf8_lossy(&body)))
            .unwrap();
        self.state.observers.lock().unwrap().push((self.id, tx));
        Ok(rx)
    }

    async fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.live.fetch_sub(1, Ordering::SeqCst);
            self.state
                .observers
                .lock()
                .unwrap()
                .retain(|(endpoint, _)| *endpoint != self.id);
            self.state
                .events
                .lock()
                .unwrap()
                .push(Event::Shutdown { endpoint: self.id });
        }
    }
}
