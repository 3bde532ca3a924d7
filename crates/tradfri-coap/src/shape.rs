// ── Payload encoding and response shapes ──
//
// Outgoing payloads are always JSON. Incoming bodies are converted by a
// `ResponseShape` picked at the call site: either handed back as text or
// decoded into a concrete type.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// How a response body should be turned into a result.
pub trait ResponseShape {
    type Output;

    fn decode(&self, body: &[u8]) -> Result<Self::Output, Error>;
}

/// Return the body unconverted, as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawText;

impl ResponseShape for RawText {
    type Output = String;

    fn decode(&self, body: &[u8]) -> Result<String, Error> {
        Ok(String::from_utf8_lossy(body).into_owned())
    }
}

/// Decode the body as JSON into `T`.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Json<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Json<T> {}

impl<T> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Json<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> ResponseShape for Json<T> {
    type Output = T;

    fn decode(&self, body: &[u8]) -> Result<T, Error> {
        serde_json::from_slice(body).map_err(|e| Error::Decode {
            message: e.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
        })
    }
}

/// Serialize an outgoing payload to JSON bytes.
pub fn encode_payload<P: Serialize + ?Sized>(payload: &P) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(payload).map_err(Error::Encode)
}
