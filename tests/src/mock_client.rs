//! A mock SQRL client: holds Ed25519 identity keys and signs envelopes the
//! way a real SQRL app does.
//!
//! The `server` echo it sends back is the *verbatim* encoded string it last
//! received, which is exactly what the server's signature check covers.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sqrl_wire::base64url;
use sqrl_wire::envelope::{ClientParameters, Command, OptFlag};
use std::collections::HashMap;

/// A scriptable client identity.
pub struct MockSqrlClient {
    signing_key: SigningKey,
    previous_key: Option<SigningKey>,
}

impl MockSqrlClient {
    /// A fresh identity.
    pub fn new() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
            previous_key: None,
        }
    }

    /// A deterministic identity, for tests that pin keys.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
            previous_key: None,
        }
    }

    /// Rotate: a new primary key, with the old one carried as `pidk`.
    pub fn rotated(self) -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
            previous_key: Some(self.signing_key),
        }
    }

    /// The current identity public key.
    pub fn identity_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Base64url form of the identity key, as it appears on the wire.
    pub fn idk(&self) -> String {
        base64url::encode(self.identity_key().as_bytes())
    }

    /// Build a signed POST body for `command`, echoing `server_b64`
    /// verbatim (either a base64url `sqrl://` URL or a previous reply body).
    pub fn envelope(
        &self,
        command: Command,
        server_b64: &str,
        options: &[OptFlag],
    ) -> HashMap<String, String> {
        let mut params = ClientParameters::new(command, self.identity_key());
        params.options = options.to_vec();
        params.previous_identity_key = self.previous_key.as_ref().map(|k| k.verifying_key());
        self.sign(params, server_b64)
    }

    /// Like [`envelope`](Self::envelope) but with full control over the
    /// parameter block.
    pub fn sign(
        &self,
        params: ClientParameters,
        server_b64: &str,
    ) -> HashMap<String, String> {
        let client_b64 = params.to_base64();
        let signed = format!("{}{}", client_b64, server_b64);
        let ids = base64url::encode(self.signing_key.sign(signed.as_bytes()).to_bytes());

        let mut fields = HashMap::from([
            ("client".to_string(), client_b64),
            ("server".to_string(), server_b64.to_string()),
            ("ids".to_string(), ids),
        ]);
        if let Some(previous) = &self.previous_key {
            let pids = base64url::encode(previous.sign(signed.as_bytes()).to_bytes());
            fields.insert("pids".to_string(), pids);
        }
        fields
    }

    /// Sign arbitrary bytes with the current identity key; used by tests
    /// that hand-build malformed envelopes.
    pub fn sign_raw(&self, message: &str) -> String {
        base64url::encode(self.signing_key.sign(message.as_bytes()).to_bytes())
    }

    /// Encode a `sqrl://` URL the way the first message echoes it.
    pub fn server_echo_of_url(url: &str) -> String {
        base64url::encode(url.as_bytes())
    }
}

impl Default for MockSqrlClient {
    fn default() -> Self {
        Self::new()
    }
}
