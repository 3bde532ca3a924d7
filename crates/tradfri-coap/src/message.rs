// ── Transport-neutral request/response types ──
//
// The client builds `Request`s and consumes `Response`s without ever
// touching a CoAP packet. Endpoint implementations own the mapping to
// and from the wire.

use std::fmt;

/// CoAP Content-Format registry value for `application/json`.
pub const CONTENT_FORMAT_JSON: u16 = 50;

/// Request method. GET carries no payload; POST and PUT may.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        })
    }
}

/// An outgoing request, ready for an endpoint to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Full resource locator, e.g. `coaps://192.168.1.20:5684/15001/65537`.
    pub uri: String,
    pub payload: Option<Vec<u8>>,
    pub content_format: Option<u16>,
    /// Register an observe relation instead of a one-shot exchange.
    pub observe: bool,
}

impl Request {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            payload: None,
            content_format: None,
            observe: false,
        }
    }

    /// Observe registration: a GET with the Observe option set.
    pub fn observe(uri: impl Into<String>) -> Self {
        Self {
            observe: true,
            ..Self::new(Method::Get, uri)
        }
    }

    /// Attach a JSON body and mark its content format.
    pub fn with_json(mut self, body: Vec<u8>) -> Self {
        self.payload = Some(body);
        self.content_format = Some(CONTENT_FORMAT_JSON);
        self
    }
}

/// Response code as `class.detail`, e.g. `2.05` Content or `4.04` Not Found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    pub class: u8,
    pub detail: u8,
}

impl Status {
    pub const CONTENT: Self = Self::new(2, 5);
    pub const CHANGED: Self = Self::new(2, 4);
    pub const CREATED: Self = Self::new(2, 1);
    pub const NOT_FOUND: Self = Self::new(4, 4);

    pub const fn new(class: u8, detail: u8) -> Self {
        Self { class, detail }
    }

    /// Split a raw CoAP code byte (`ccc ddddd`).
    pub const fn from_code(code: u8) -> Self {
        Self::new(code >> 5, code & 0x1f)
    }

    pub fn is_success(self) -> bool {
        self.class == 2
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class, self.detail)
    }
}

/// A response or observe notification received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_format: Option<u16>,
    /// Observe sequence number, present on notifications.
    pub observe: Option<u32>,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn new(status: Status, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_format: None,
            observe: None,
            payload: payload.into(),
        }
    }

    /// Payload decoded as UTF-8, replacing invalid sequences.
    pub fn payload_string(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
