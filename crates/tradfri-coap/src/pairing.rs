// ── Gateway pairing ──
//
// A fresh client holds only the security code printed on the gateway.
// Pairing trades it for a per-identity pre-shared key: with the pairing
// credentials active, POST `{"9090": identity}` to the authenticate
// resource and read the key from `9091`.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::CoapClient;
use crate::credentials::Credentials;
use crate::error::Error;
use crate::message::Method;
use crate::resource;
use crate::shape::Json;
use crate::transport::Connector;

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    #[serde(rename = "9090")]
    identity: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    #[serde(rename = "9091")]
    key: String,
    #[serde(rename = "9029", default)]
    firmware: Option<String>,
}

/// Result of a successful pairing.
#[derive(Debug, Clone)]
pub struct Registration {
    pub credentials: Credentials,
    /// Gateway firmware version, when reported.
    pub firmware: Option<String>,
}

/// Register `identity` with the gateway at `host`.
///
/// The client must already hold [`Credentials::for_pairing`]. On success
/// the returned credentials are ready for [`CoapClient::set_credentials`];
/// the client itself is left on the pairing credentials.
pub async fn register_identity<C: Connector>(
    client: &CoapClient<C>,
    host: &str,
    identity: &str,
) -> Result<Registration, Error> {
    let uri = resource::uri(host, resource::AUTHENTICATE);
    let response: RegisterResponse = client
        .exchange(
            Method::Post,
            &uri,
            Some(&RegisterRequest { identity }),
            &Json::<RegisterResponse>::new(),
        )
        .await?;

    info!(identity, firmware = ?response.firmware, "gateway issued pre-shared key");

    Ok(Registration {
        credentials: Credentials::new(identity, SecretString::from(response.key)),
        firmware: response.firmware,
    })
}
