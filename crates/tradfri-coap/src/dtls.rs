// ── CoAP over DTLS endpoint ──
//
// The production `Connector`: a connected UDP socket wrapped in a DTLS
// client session (PSK, TLS_PSK_WITH_AES_128_CCM_8 as the gateway requires),
// with CoAP messages encoded by `coap-lite`. A background reader task
// matches responses to waiters by token and routes observe notifications
// to their relation's channel. Confirmable requests are retransmitted on
// the RFC 7252 schedule until acknowledged, and duplicate messages from the
// gateway are acknowledged again without being delivered twice.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType};
use dashmap::{DashMap, DashSet};
use secrecy::ExposeSecret;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;
use webrtc_dtls::cipher_suite::CipherSuiteId;
use webrtc_dtls::config::Config as DtlsConfig;
use webrtc_dtls::conn::DTLSConn;
use webrtc_util::Conn;

use crate::error::Error;
use crate::message::{Method, Request, Response, Status};
use crate::transport::{Connector, Endpoint, EndpointConfig};

/// Largest datagram the reader accepts.
const MAX_DATAGRAM: usize = 4096;

/// Notifications buffered per relation before new ones are dropped.
const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

/// Initial wait for an ACK before a Confirmable request is resent.
const ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Resends of one Confirmable request before waiting silently.
const MAX_RETRANSMIT: u32 = 4;

/// How long a message ID from the gateway counts as a duplicate.
const EXCHANGE_LIFETIME: Duration = Duration::from_secs(247);

/// Remembered message IDs before expired ones are pruned.
const RECENT_PRUNE_AT: usize = 256;

// ── DtlsConnector ────────────────────────────────────────────────────

/// Builds [`DtlsEndpoint`]s: bind, connect, handshake, start the reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct DtlsConnector;

impl Connector for DtlsConnector {
    type Endpoint = DtlsEndpoint;

    async fn connect(&self, config: EndpointConfig) -> Result<DtlsEndpoint, Error> {
        let socket = UdpSocket::bind(config.local).await?;
        socket.connect(config.peer).await?;

        let key = config.psk.key.expose_secret().to_vec();
        let dtls_config = DtlsConfig {
            psk: Some(Arc::new(
                move |_hint: &[u8]| -> Result<Vec<u8>, webrtc_dtls::Error> { Ok(key.clone()) },
            )),
            psk_identity_hint: Some(config.psk.identity.into_bytes()),
            cipher_suites: vec![CipherSuiteId::Tls_Psk_With_Aes_128_Ccm_8],
            ..Default::default()
        };

        debug!(peer = %config.peer, "starting DTLS handshake");
        let conn = DTLSConn::new(Arc::new(socket), dtls_config, true, None)
            .await
            .map_err(|e| Error::Handshake(e.to_string()))?;
        debug!(peer = %config.peer, "DTLS handshake complete");

        Ok(DtlsEndpoint::start(Arc::new(conn), config.peer))
    }
}

// ── DtlsEndpoint ─────────────────────────────────────────────────────

/// One DTLS session with the gateway.
pub struct DtlsEndpoint {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    conn: Arc<DTLSConn>,
    peer: SocketAddr,
    message_id: AtomicU16,
    next_token: AtomicU32,
    router: Router,
}

/// Inbound side: who is waiting for what, and what was already delivered.
#[derive(Default)]
struct Router {
    pending: DashMap<Vec<u8>, oneshot::Sender<Response>>,
    observers: DashMap<Vec<u8>, mpsc::Sender<Response>>,
    /// Our Confirmable message IDs still waiting for any ACK.
    unacked: DashSet<u16>,
    recent: RecentIds,
}

/// Message IDs of Confirmable and Non-confirmable messages already
/// delivered from the gateway (RFC 7252 §4.5).
struct RecentIds {
    seen: DashMap<u16, Instant>,
    lifetime: Duration,
}

impl DtlsEndpoint {
    fn start(conn: Arc<DTLSConn>, peer: SocketAddr) -> Self {
        let shared = Arc::new(Shared {
            conn,
            peer,
            message_id: AtomicU16::new(initial_message_id()),
            next_token: AtomicU32::new(1),
            router: Router::default(),
        });
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(read_loop(Arc::clone(&shared), cancel.clone()));

        Self {
            shared,
            cancel,
            reader: Mutex::new(Some(reader)),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.shared.peer
    }
}

impl Endpoint for DtlsEndpoint {
    async fn exchange(&self, request: Request) -> Result<Response, Error> {
        let token = self.shared.token();
        let message_id = self.shared.message_id();
        let datagram = encode_request(&request, message_id, &token)?;

        let (tx, rx) = oneshot::channel();
        self.shared.router.pending.insert(token.clone(), tx);
        let _guard = Registration::new(&self.shared, token, message_id);

        trace!(method = %request.method, uri = %request.uri, message_id, "CoAP request");
        self.shared.transmit(&datagram, message_id, rx).await
    }

    async fn observe(&self, request: Request) -> Result<mpsc::Receiver<Response>, Error> {
        let token = self.shared.token();
        let message_id = self.shared.message_id();
        let datagram = encode_request(&request, message_id, &token)?;

        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);
        let (ack_tx, ack_rx) = oneshot::channel();
        self.shared.router.observers.insert(token.clone(), notify_tx);
        self.shared.router.pending.insert(token.clone(), ack_tx);
        let mut registration = Registration::new(&self.shared, token, message_id);

        let first = self.shared.transmit(&datagram, message_id, ack_rx).await?;

        if first.observe.is_some() {
            registration.keep_observer();
        } else {
            // Resource is not observable: the single answer is already
            // queued, and the channel closes right after it.
            debug!(uri = %request.uri, status = %first.status, "peer declined observe");
        }
        Ok(notify_rx)
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        if let Err(e) = self.shared.conn.close().await {
            debug!(error = %e, "DTLS close failed");
        }
        self.shared.router.fail_waiters();

        let reader = self.reader.lock().await.take();
        if let Some(reader) = reader {
            let _ = reader.await;
        }
    }
}

impl Drop for DtlsEndpoint {
    fn drop(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        // Dropped without shutdown: the DTLS session keeps its own socket
        // task alive until closed.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let conn = Arc::clone(&self.shared.conn);
            runtime.spawn(async move {
                if let Err(e) = conn.close().await {
                    debug!(error = %e, "DTLS close on drop failed");
                }
            });
        }
    }
}

/// Removes a token's waiter (and optionally its observer) when the
/// request finishes, times out, or is dropped.
struct Registration<'a> {
    shared: &'a Shared,
    token: Vec<u8>,
    message_id: u16,
    keep_observer: bool,
}

impl<'a> Registration<'a> {
    fn new(shared: &'a Shared, token: Vec<u8>, message_id: u16) -> Self {
        Self {
            shared,
            token,
            message_id,
            keep_observer: false,
        }
    }

    fn keep_observer(&mut self) {
        self.keep_observer = true;
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let router = &self.shared.router;
        router.pending.remove(&self.token);
        router.unacked.remove(&self.message_id);
        if !self.keep_observer {
            router.observers.remove(&self.token);
        }
    }
}

impl Shared {
    fn message_id(&self) -> u16 {
        self.message_id.fetch_add(1, Ordering::Relaxed)
    }

    fn token(&self) -> Vec<u8> {
        self.next_token
            .fetch_add(1, Ordering::Relaxed)
            .to_be_bytes()
            .to_vec()
    }

    async fn send(&self, datagram: &[u8]) -> Result<(), Error> {
        self.conn
            .send(datagram)
            .await
            .map(|_| ())
            .map_err(|e| Error::Send(e.to_string()))
    }

    /// Send a Confirmable request and wait for the reply on `rx`,
    /// resending until the gateway acknowledges it.
    async fn transmit(
        &self,
        datagram: &[u8],
        message_id: u16,
        rx: oneshot::Receiver<Response>,
    ) -> Result<Response, Error> {
        self.router.unacked.insert(message_id);
        self.send(datagram).await?;

        with_retransmission(
            rx,
            move || !self.router.unacked.contains(&message_id),
            move || {
                trace!(message_id, "retransmitting");
                self.send(datagram)
            },
        )
        .await
    }

    async fn send_empty(&self, kind: MessageType, message_id: u16) {
        let mut packet = Packet::new();
        packet.header.set_type(kind);
        packet.header.code = MessageClass::Empty;
        packet.header.message_id = message_id;

        match packet.to_bytes() {
            Ok(bytes) => {
                if let Err(e) = self.send(&bytes).await {
                    debug!(error = %e, ?kind, "failed to send empty message");
                }
            }
            Err(e) => debug!(error = ?e, "failed to encode empty message"),
        }
    }

    async fn handle_packet(&self, packet: Packet) {
        if let Some(reply) = self.router.route(&packet) {
            self.send_empty(reply, packet.header.message_id).await;
        }
    }
}

/// Wait for `rx`, calling `resend` each time the current ACK window closes
/// with the request still unacknowledged. The window doubles per resend;
/// after [`MAX_RETRANSMIT`] resends, or once `acked` reports a bare ACK
/// for a separate response, it just waits.
async fn with_retransmission<A, R, F>(
    mut rx: oneshot::Receiver<Response>,
    acked: A,
    mut resend: R,
) -> Result<Response, Error>
where
    A: Fn() -> bool,
    R: FnMut() -> F,
    F: Future<Output = Result<(), Error>>,
{
    let mut window = ACK_TIMEOUT;
    for _ in 0..MAX_RETRANSMIT {
        match tokio::time::timeout(window, &mut rx).await {
            Ok(reply) => return reply.map_err(|_| Error::Interrupted),
            Err(_) if acked() => break,
            Err(_) => {
                resend().await?;
                window *= 2;
            }
        }
    }
    rx.await.map_err(|_| Error::Interrupted)
}

// ── Inbound routing ──────────────────────────────────────────────────

impl Router {
    fn fail_waiters(&self) {
        // Dropping the senders wakes every waiter with a closed channel.
        self.pending.clear();
        self.observers.clear();
    }

    /// Deliver one inbound message. Returns the empty message to answer
    /// with, if any.
    ///
    /// A notification arriving while its relation's channel is full is
    /// dropped (and still acknowledged); the relation stays registered.
    fn route(&self, packet: &Packet) -> Option<MessageType> {
        let kind = packet.header.get_type();
        let message_id = packet.header.message_id;

        if matches!(kind, MessageType::Acknowledgement) {
            self.unacked.remove(&message_id);
        }
        if matches!(packet.header.code, MessageClass::Empty) {
            // Bare ACK for a separate response, or RST.
            trace!(?kind, message_id, "empty message");
            return None;
        }

        let from_peer = matches!(
            kind,
            MessageType::Confirmable | MessageType::NonConfirmable
        );
        if from_peer && self.recent.contains(message_id) {
            trace!(message_id, "duplicate message, not delivered again");
            return matches!(kind, MessageType::Confirmable).then_some(MessageType::Acknowledgement);
        }

        let token = packet.get_token().to_vec();
        let response = decode_response(packet);
        let mut matched = false;

        let observer = self
            .observers
            .get(&token)
            .map(|entry| entry.value().clone());
        if let Some(observer) = observer {
            match observer.try_send(response.clone()) {
                Ok(()) => matched = true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(message_id, "observer lagging, notification dropped");
                    matched = true;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Relation was cancelled; the RST below deregisters it.
                    self.observers.remove(&token);
                }
            }
        }

        if let Some((_, waiter)) = self.pending.remove(&token) {
            let _ = waiter.send(response);
            matched = true;
        }

        if matched && from_peer {
            self.recent.insert(message_id);
        }

        match (matched, kind) {
            (true, MessageType::Confirmable) => Some(MessageType::Acknowledgement),
            (false, MessageType::Confirmable | MessageType::NonConfirmable) => {
                trace!(message_id, "rejecting unmatched message");
                Some(MessageType::Reset)
            }
            _ => None,
        }
    }
}

impl Default for RecentIds {
    fn default() -> Self {
        Self::new(EXCHANGE_LIFETIME)
    }
}

impl RecentIds {
    fn new(lifetime: Duration) -> Self {
        Self {
            seen: DashMap::new(),
            lifetime,
        }
    }

    fn contains(&self, message_id: u16) -> bool {
        self.seen
            .get(&message_id)
            .is_some_and(|at| at.elapsed() < self.lifetime)
    }

    fn insert(&self, message_id: u16) {
        let now = Instant::now();
        if self.seen.len() >= RECENT_PRUNE_AT {
            self.seen
                .retain(|_, at| now.duration_since(*at) < self.lifetime);
        }
        self.seen.insert(message_id, now);
    }
}

async fn read_loop(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let read = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            read = shared.conn.recv(&mut buf) => read,
        };

        let len = match read {
            Ok(len) => len,
            Err(e) => {
                warn!(error = %e, peer = %shared.peer, "DTLS read failed, closing endpoint");
                break;
            }
        };

        match Packet::from_bytes(&buf[..len]) {
            Ok(packet) => shared.handle_packet(packet).await,
            Err(e) => debug!(error = ?e, len, "discarding malformed datagram"),
        }
    }

    shared.router.fail_waiters();
    debug!(peer = %shared.peer, "DTLS reader exiting");
}

// ── Packet conversion ────────────────────────────────────────────────

fn encode_request(request: &Request, message_id: u16, token: &[u8]) -> Result<Vec<u8>, Error> {
    let uri = Url::parse(&request.uri)?;

    let mut packet = Packet::new();
    packet.header.set_type(MessageType::Confirmable);
    packet.header.code = MessageClass::Request(match request.method {
        Method::Get => RequestType::Get,
        Method::Post => RequestType::Post,
        Method::Put => RequestType::Put,
    });
    packet.header.message_id = message_id;
    packet.set_token(token.to_vec());

    if request.observe {
        packet.add_option(CoapOption::Observe, encode_uint(0));
    }
    // Options carry the unescaped bytes.
    if let Some(segments) = uri.path_segments() {
        for segment in segments.filter(|s| !s.is_empty()) {
            let segment = urlencoding::decode_binary(segment.as_bytes());
            packet.add_option(CoapOption::UriPath, segment.into_owned());
        }
    }
    if let Some(query) = uri.query() {
        for param in query.split('&').filter(|q| !q.is_empty()) {
            let param = urlencoding::decode_binary(param.as_bytes());
            packet.add_option(CoapOption::UriQuery, param.into_owned());
        }
    }
    if let Some(format) = request.content_format {
        packet.add_option(CoapOption::ContentFormat, encode_uint(u32::from(format)));
    }
    if let Some(ref payload) = request.payload {
        packet.payload.clone_from(payload);
    }

    packet
        .to_bytes()
        .map_err(|e| Error::Message(format!("{e:?}")))
}

fn decode_response(packet: &Packet) -> Response {
    let first_option = |option: CoapOption| {
        packet
            .get_option(option)
            .and_then(|values| values.front())
            .map(|value| decode_uint(value))
    };

    Response {
        status: Status::from_code(u8::from(packet.header.code)),
        content_format: first_option(CoapOption::ContentFormat)
            .and_then(|v| u16::try_from(v).ok()),
        observe: first_option(CoapOption::Observe),
        payload: packet.payload.clone(),
    }
}

/// Minimal big-endian encoding; zero is the empty string.
fn encode_uint(value: u32) -> Vec<u8> {
    value
        .to_be_bytes()
        .into_iter()
        .skip_while(|b| *b == 0)
        .collect()
}

fn decode_uint(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0, |acc, b| (acc << 8) | u32::from(*b))
}

fn initial_message_id() -> u16 {
    // Start away from zero so a rebuilt session does not replay message
    // IDs still in the gateway's deduplication window.
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    u16::try_from(nanos & 0xffff).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::message::CONTENT_FORMAT_JSON;

    fn options(packet: &Packet, option: CoapOption) -> Vec<Vec<u8>> {
        packet
            .get_option(option)
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn uint_encoding_is_minimal() {
        assert!(encode_uint(0).is_empty());
        assert_eq!(encode_uint(50), vec![50]);
        assert_eq!(encode_uint(0x0102), vec![1, 2]);
        assert_eq!(decode_uint(&[1, 2]), 0x0102);
        assert_eq!(decode_uint(&[]), 0);
    }

    #[test]
    fn request_maps_uri_to_options() {
        let request = Request::new(Method::Put, "coaps://10.0.0.5:5684/15001/65537?a=1&b")
            .with_json(br#"{"3311":[{"5850":1}]}"#.to_vec());
        let bytes = encode_request(&request, 0x1234, &[0, 0, 0, 7]).unwrap();
        let packet = Packet::from_bytes(&bytes).unwrap();

        assert!(matches!(packet.header.get_type(), MessageType::Confirmable));
        assert!(matches!(
            packet.header.code,
            MessageClass::Request(RequestType::Put)
        ));
        assert_eq!(packet.header.message_id, 0x1234);
        assert_eq!(packet.get_token().to_vec(), vec![0, 0, 0, 7]);
        assert_eq!(
            options(&packet, CoapOption::UriPath),
            vec![b"15001".to_vec(), b"65537".to_vec()]
        );
        assert_eq!(
            options(&packet, CoapOption::UriQuery),
            vec![b"a=1".to_vec(), b"b".to_vec()]
        );
        assert_eq!(
            options(&packet, CoapOption::ContentFormat),
            vec![vec![50]]
        );
        assert_eq!(packet.payload, br#"{"3311":[{"5850":1}]}"#.to_vec());
    }

    #[test]
    fn observe_request_carries_observe_option() {
        let request = Request::observe("coaps://gw:5684/15004/131073");
        let bytes = encode_request(&request, 1, &[9]).unwrap();
        let packet = Packet::from_bytes(&bytes).unwrap();

        assert_eq!(options(&packet, CoapOption::Observe), vec![Vec::<u8>::new()]);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn invalid_uri_is_rejected_before_encoding() {
        let request = Request::new(Method::Get, "not a uri");
        assert!(matches!(
            encode_request(&request, 1, &[1]),
            Err(Error::InvalidUri(_))
        ));
    }

    #[test]
    fn escaped_path_segments_are_sent_unescaped() {
        let request = Request::new(Method::Get, "coaps://gw:5684/15001/living%20room?name=a%26b");
        let bytes = encode_request(&request, 1, &[1]).unwrap();
        let packet = Packet::from_bytes(&bytes).unwrap();

        assert_eq!(
            options(&packet, CoapOption::UriPath),
            vec![b"15001".to_vec(), b"living room".to_vec()]
        );
        assert_eq!(
            options(&packet, CoapOption::UriQuery),
            vec![b"name=a&b".to_vec()]
        );
    }

    fn notification(message_id: u16, token: &[u8], body: &str) -> Packet {
        let mut packet = Packet::new();
        packet.header.set_type(MessageType::Confirmable);
        packet.header.code = MessageClass::Response(coap_lite::ResponseType::Content);
        packet.header.message_id = message_id;
        packet.set_token(token.to_vec());
        packet.add_option(CoapOption::Observe, encode_uint(u32::from(message_id)));
        packet.payload = body.as_bytes().to_vec();
        packet
    }

    fn drain(rx: &mut mpsc::Receiver<Response>) -> Vec<String> {
        let mut bodies = Vec::new();
        while let Ok(response) = rx.try_recv() {
            bodies.push(response.payload_string());
        }
        bodies
    }

    #[test]
    fn resent_notification_is_acked_but_delivered_once() {
        let router = Router::default();
        let (tx, mut rx) = mpsc::channel(8);
        router.observers.insert(vec![7], tx);

        let first = notification(0x4241, &[7], "0");
        let second = notification(0x4242, &[7], "1");
        for packet in [&first, &second, &second] {
            assert!(matches!(
                router.route(packet),
                Some(MessageType::Acknowledgement)
            ));
        }

        assert_eq!(drain(&mut rx), vec!["0", "1"]);
    }

    #[test]
    fn unmatched_messages_are_reset_every_time() {
        let router = Router::default();
        let stray = notification(9, &[1, 2, 3], "{}");

        assert!(matches!(router.route(&stray), Some(MessageType::Reset)));
        assert!(matches!(router.route(&stray), Some(MessageType::Reset)));
    }

    #[test]
    fn full_observer_channel_drops_notification_but_keeps_relation() {
        let router = Router::default();
        let (tx, mut rx) = mpsc::channel(1);
        router.observers.insert(vec![7], tx);

        assert!(router.route(&notification(1, &[7], "kept")).is_some());
        assert!(matches!(
            router.route(&notification(2, &[7], "lost")),
            Some(MessageType::Acknowledgement)
        ));
        assert_eq!(drain(&mut rx), vec!["kept"]);

        router.route(&notification(3, &[7], "next"));
        assert_eq!(drain(&mut rx), vec!["next"]);
    }

    #[test]
    fn ack_clears_unacked_request() {
        let router = Router::default();
        router.unacked.insert(0x10);

        let mut ack = Packet::new();
        ack.header.set_type(MessageType::Acknowledgement);
        ack.header.code = MessageClass::Empty;
        ack.header.message_id = 0x10;

        assert!(router.route(&ack).is_none());
        assert!(!router.unacked.contains(&0x10));
    }

    #[test]
    fn message_ids_expire() {
        let recent = RecentIds::new(Duration::ZERO);
        recent.insert(5);
        assert!(!recent.contains(5));

        let recent = RecentIds::default();
        recent.insert(5);
        assert!(recent.contains(5));
        assert!(!recent.contains(6));
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_request_is_resent_with_backoff() {
        let (tx, rx) = oneshot::channel();
        let resends = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&resends);
        let started = tokio::time::Instant::now();

        let waiter = tokio::spawn(with_retransmission(
            rx,
            || false,
            move || {
                log.lock().unwrap().push(started.elapsed().as_secs());
                std::future::ready(Ok(()))
            },
        ));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(*resends.lock().unwrap(), vec![2, 6, 14, 30]);

        tx.send(Response::new(Status::CONTENT, "late")).unwrap();
        let reply = waiter.await.unwrap().unwrap();
        assert_eq!(reply.payload_string(), "late");
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_request_is_not_resent() {
        let (tx, rx) = oneshot::channel::<Response>();
        let resends = Arc::new(AtomicU32::new(0));
        let count = Arc::clone(&resends);

        let waiter = tokio::spawn(with_retransmission(
            rx,
            || true,
            move || {
                count.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok(()))
            },
        ));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(resends.load(Ordering::SeqCst), 0);

        drop(tx);
        assert!(matches!(waiter.await.unwrap(), Err(Error::Interrupted)));
    }

    #[test]
    fn response_fields_are_decoded() {
        let mut packet = Packet::new();
        packet.header.set_type(MessageType::Acknowledgement);
        packet.header.code = MessageClass::Response(coap_lite::ResponseType::Content);
        packet.set_token(vec![1, 2]);
        packet.add_option(CoapOption::Observe, encode_uint(17));
        packet.add_option(
            CoapOption::ContentFormat,
            encode_uint(u32::from(CONTENT_FORMAT_JSON)),
        );
        packet.payload = b"{}".to_vec();

        let response = decode_response(&packet);
        assert_eq!(response.status, Status::CONTENT);
        assert_eq!(response.observe, Some(17));
        assert_eq!(response.content_format, Some(CONTENT_FORMAT_JSON));
        assert_eq!(response.payload, b"{}".to_vec());
    }
}
