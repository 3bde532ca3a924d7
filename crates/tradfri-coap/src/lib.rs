// tradfri-coap: Secure CoAP client for IKEA TRÅDFRI gateways

pub mod client;
pub mod credentials;
pub mod dtls;
pub mod error;
pub mod exchange;
pub mod message;
pub mod observe;
pub mod pairing;
pub mod resource;
pub mod shape;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ClientConfig, CoapClient};
pub use credentials::{CredentialStore, Credentials, PAIRING_IDENTITY};
pub use dtls::{DtlsConnector, DtlsEndpoint};
pub use error::Error;
pub use exchange::{DEFAULT_TIMEOUT, Dispatcher};
pub use message::{CONTENT_FORMAT_JSON, Method, Request, Response, Status};
pub use observe::{Subscription, SubscriptionManager};
pub use pairing::{Registration, register_identity};
pub use shape::{Json, RawText, ResponseShape};
pub use transport::{
    Connector, Endpoint, EndpointConfig, GatewayResolver, PskEntry, SECURE_PORT, StaticGateway,
    TransportManager, TransportState,
};
