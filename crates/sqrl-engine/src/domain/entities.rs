//! Core data structures for the protocol engine.

use ed25519_dalek::VerifyingKey;
use sqrl_wire::{Command, Tif};
use std::time::Instant;

/// Raw bytes of a per-site Ed25519 identity public key.
pub type IdentityKey = [u8; 32];

/// One verified client message, the unit of work for the engine.
///
/// Lifetime is a single request; everything durable lives in the nut
/// registry or the identity store.
#[derive(Clone, Debug)]
pub struct ClientRequest {
    /// Protocol revision the client speaks. Only `1` is accepted.
    pub protocol_version: u32,
    /// The verified command.
    pub command: Command,
    /// The nut the client is replying against.
    pub nut: String,
    /// Primary identity public key; its signature over the envelope has
    /// been verified.
    pub primary_identity_public_key: VerifyingKey,
    /// Retiring key during rotation; its signature has been verified too.
    pub previous_identity_public_key: Option<VerifyingKey>,
    /// Session unlock key deposited for later identity operations. Opaque
    /// to the engine.
    pub server_unlock_public_key: Option<String>,
    /// Verify unlock key. Opaque to the engine.
    pub server_verify_unlock_public_key: Option<String>,
    /// Indexed secret answering a server `sin=` request.
    pub index_secret: Option<String>,
    /// Indexed secret under the previous identity.
    pub previous_index_secret: Option<String>,
    /// Client asks the site to accept only SQRL authentication.
    pub sqrl_only: bool,
    /// Client asks the site to refuse side-channel identity changes.
    pub hard_lock: bool,
    /// Client holds a secure return path to the browser (cps).
    pub client_provided_session: bool,
    /// Client asks for the stored session unlock key back (suk).
    pub return_session_unlock_key: bool,
    /// Button selection answering a server `ask=` prompt, 1..=3.
    pub server_ask_response_selection: Option<u8>,
    /// Unlock request signature, transported but not evaluated.
    pub unlock_request_signature: Option<String>,
}

impl ClientRequest {
    /// The primary identity key as raw bytes, the form stores key on.
    pub fn identity_key(&self) -> IdentityKey {
        self.primary_identity_public_key.to_bytes()
    }

    /// The previous identity key as raw bytes, when present.
    pub fn previous_identity_key(&self) -> Option<IdentityKey> {
        self.previous_identity_public_key.as_ref().map(|k| k.to_bytes())
    }
}

/// Transport metadata accompanying a request. Logging only; the engine
/// never keys protocol decisions off it.
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    /// Remote address as reported by the transport.
    pub remote_addr: Option<String>,
}

/// One issued nut and everything the server remembers about it.
#[derive(Clone, Debug)]
pub struct NutRecord {
    /// The nut in wire form; primary key.
    pub nut: String,
    /// The full `sqrl://` URL the nut was embedded in, if any.
    pub url: Option<String>,
    /// Issue time; records expire on a TTL.
    pub created_at: Instant,
    /// The earliest ancestor of this conversation: the nut in the original
    /// QR code. `None` means this record *is* the origin. Descendants point
    /// directly at the origin, never at their immediate predecessor.
    pub original_login_nut: Option<String>,
    /// Flipped on a successful `ident`; read by the login poll.
    pub logged_in: bool,
    /// Set alongside `logged_in` to bind the conversation to an identity.
    pub client_primary_identity_public_key: Option<IdentityKey>,
    /// Single-use claim: set once the protocol path has accepted this nut.
    /// The poll path ignores it.
    pub consumed: bool,
}

impl NutRecord {
    /// The origin nut of this record's conversation.
    pub fn origin_nut(&self) -> &str {
        self.original_login_nut.as_deref().unwrap_or(&self.nut)
    }
}

/// A durable identity as the engine sees it. The store may keep more.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentityRecord {
    /// Current per-site public key.
    pub primary_identity_public_key: IdentityKey,
    /// Retired keys, most recent first, used to detect rotation.
    pub previous_identity_public_keys: Vec<IdentityKey>,
    /// SQRL authentication disabled for this identity.
    pub disabled: bool,
    /// Stored session unlock key, returned on request.
    pub session_unlock_key: Option<String>,
    /// Stored verify unlock key.
    pub verify_unlock_key: Option<String>,
    /// Client advice: only SQRL authentication should be accepted.
    pub sqrl_only: bool,
    /// Client advice: refuse side-channel identity changes.
    pub hard_lock: bool,
}

/// What an identity-store operation reports back to the engine.
#[derive(Clone, Debug, Default)]
pub struct AuthOutcome {
    /// The matched or affected identity, if any.
    pub user: Option<IdentityRecord>,
    /// TIF bits contributed by the store.
    pub tif_bits: Tif,
    /// The stored session unlock key, when the client asked for it.
    pub session_unlock_key: Option<String>,
    /// A secret-index request for the client to answer with `ins` on its
    /// next message (sin).
    pub secret_index: Option<String>,
}

impl AuthOutcome {
    /// An outcome carrying only TIF bits.
    pub fn with_tif(tif_bits: Tif) -> Self {
        Self {
            tif_bits,
            ..Self::default()
        }
    }

    /// True unless the store marked the command failed.
    pub fn succeeded(&self) -> bool {
        !self.tif_bits.contains(Tif::COMMAND_FAILED)
    }
}
