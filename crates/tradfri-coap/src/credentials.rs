// ── Pre-shared-key credentials ──
//
// One identity + key pair for one gateway. Replacing credentials on the
// client always swaps the whole value; there is no in-place mutation.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::{ExposeSecret, SecretString};

/// Identity used while pairing with the gateway's printed security code.
pub const PAIRING_IDENTITY: &str = "Client_identity";

/// DTLS pre-shared-key credentials for a single gateway.
///
/// The key is held as a [`SecretString`] so it never shows up in `Debug`
/// output or logs. No validation is done here: a malformed key surfaces
/// later as a handshake failure.
#[derive(Debug, Clone)]
pub struct Credentials {
    identity: String,
    key: SecretString,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, key: impl Into<SecretString>) -> Self {
        Self {
            identity: identity.into(),
            key: key.into(),
        }
    }

    /// Credentials for the one-time pairing exchange: the fixed pairing
    /// identity plus the security code from the gateway's label.
    pub fn for_pairing(security_code: impl Into<String>) -> Self {
        Self::new(PAIRING_IDENTITY, SecretString::from(security_code.into()))
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn key(&self) -> &SecretString {
        &self.key
    }

    /// Raw key bytes as handed to the DTLS PSK table.
    pub(crate) fn key_bytes(&self) -> Vec<u8> {
        self.key.expose_secret().as_bytes().to_vec()
    }
}

/// Holder for the client's current credentials.
///
/// Reads and writes are lock-free; every reader gets a consistent
/// snapshot of one whole credential pair.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: ArcSwapOption<Credentials>,
}

impl CredentialStore {
    pub fn get(&self) -> Option<Arc<Credentials>> {
        self.current.load_full()
    }

    pub fn set(&self, credentials: Credentials) {
        self.current.store(Some(Arc::new(credentials)));
    }
}
