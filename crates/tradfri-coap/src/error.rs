use thiserror::Error;

/// Top-level error type for the `tradfri-coap` crate.
///
/// Covers every failure mode of the client: transport establishment,
/// request dispatch, and payload encoding.
/// The convenience methods on [`CoapClient`](crate::CoapClient) flatten
/// all of these into `None`; [`CoapClient::exchange`](crate::CoapClient::exchange)
/// hands them back unchanged.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// No secured endpoint is installed (credentials never set, or the
    /// last rebuild failed).
    #[error("No active transport -- set credentials first")]
    NoTransport,

    /// A rebuild was requested before any credentials were stored.
    #[error("No credentials configured")]
    NoCredentials,

    /// The gateway host could not be resolved to a socket address.
    #[error("Failed to resolve gateway {host}: {reason}")]
    Resolve { host: String, reason: String },

    /// Local socket bind or connect failed.
    #[error("Socket error: {0}")]
    Socket(#[from] std::io::Error),

    /// DTLS handshake failed (bad identity/key, peer unreachable).
    #[error("DTLS handshake failed: {0}")]
    Handshake(String),

    /// A newer credential change or a close took over while this rebuild
    /// was still connecting.
    #[error("Rebuild superseded before the endpoint was installed")]
    Superseded,

    /// Writing a datagram to the secured endpoint failed.
    #[error("Send failed: {0}")]
    Send(String),

    /// The endpoint was shut down while a response was outstanding.
    #[error("Endpoint closed while waiting for a response")]
    Interrupted,

    /// No response arrived inside the configured window.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Messages ────────────────────────────────────────────────────
    /// Resource locator could not be parsed.
    #[error("Invalid URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// CoAP message could not be encoded or parsed.
    #[error("Malformed CoAP message: {0}")]
    Message(String),

    // ── Data ────────────────────────────────────────────────────────
    /// Outgoing payload could not be serialized. Nothing was sent.
    #[error("Payload encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Response body did not match the requested shape, with the raw
    /// body for debugging.
    #[error("Deserialization error: {message}")]
    Decode { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Interrupted
                | Self::Send(_)
                | Self::Handshake(_)
                | Self::Superseded
        )
    }

    /// Returns `true` if the failure happened before any bytes left the client.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NoTransport
                | Self::NoCredentials
                | Self::InvalidUri(_)
                | Self::Message(_)
                | Self::Encode(_)
        )
    }
}
