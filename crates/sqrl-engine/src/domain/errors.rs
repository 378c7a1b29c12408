//! Protocol failure modes.
//!
//! Failures never surface as panics: every variant is rendered into a
//! normally-framed SQRL reply carrying TIF failure bits, an `ask=` cause,
//! and a fresh nut so the client may retry.

use sqrl_wire::Tif;
use thiserror::Error;

/// Everything that can go wrong while processing one client message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The POST body was missing `client` or `server`, or a block failed
    /// to decode.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The client block carried no `idk`.
    #[error("missing identity key (idk)")]
    MissingIdentityKey,

    /// The envelope carried no `ids` (or no `pids` for a presented `pidk`).
    #[error("missing signature ({0})")]
    MissingSignature(&'static str),

    /// A signature did not verify over the envelope bytes.
    #[error("signature verification failed ({0})")]
    BadSignature(&'static str),

    /// The `server` field decoded but carried no nut.
    #[error("malformed server field: {0}")]
    MalformedServerField(String),

    /// The `opt` list carried a flag this server does not know.
    #[error("unknown option: {0}")]
    UnknownOption(String),

    /// The client speaks a protocol revision other than 1.
    #[error("unsupported version {0}: this server implements protocol revision 1")]
    UnsupportedVersion(String),

    /// The `cmd` field was absent or named no known command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The presented nut was never issued, has expired, or was already
    /// consumed by an earlier message.
    #[error("unknown nut: {0}")]
    UnknownNut(String),

    /// An identity-store call failed; the client should retry against the
    /// fresh nut in the reply.
    #[error("transient internal error: {0}")]
    TransientInternal(String),
}

impl ProtocolError {
    /// HTTP status the reply is sent with.
    pub fn http_status(&self) -> u16 {
        match self {
            ProtocolError::TransientInternal(_) => 500,
            _ => 400,
        }
    }

    /// TIF bits the reply carries for this failure.
    pub fn tif_bits(&self) -> Tif {
        match self {
            ProtocolError::TransientInternal(_) => Tif::COMMAND_FAILED | Tif::TRANSIENT_ERROR,
            _ => Tif::COMMAND_FAILED | Tif::CLIENT_FAILURE,
        }
    }
}
