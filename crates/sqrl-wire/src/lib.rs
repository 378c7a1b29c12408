//! # SQRL Wire Format
//!
//! Codec for the SQRL (Secure Quick Reliable Login) wire protocol.
//!
//! ## Architecture
//!
//! This crate is pure data transformation, no I/O and no protocol state:
//! - **base64url** (`base64url`): unpadded base64url framing used everywhere
//!   on the wire
//! - **Name-value blocks** (`nv`): the CRLF-terminated `name=value` line
//!   format carried inside `client` and `server` fields
//! - **URLs** (`url`): construction and canonicalization of `sqrl://` URLs
//! - **Envelopes** (`envelope`): the client POST body and its decoded
//!   parameter block
//! - **Replies** (`reply`): the server's response block
//! - **TIF** (`tif`): the bit-packed Transaction Information Flags
//!
//! The protocol engine (`sqrl-engine`) builds on these types; nothing here
//! touches a nut registry or an identity store.

pub mod base64url;
pub mod envelope;
pub mod error;
pub mod nv;
pub mod reply;
pub mod tif;
pub mod url;

// Re-export public API
pub use envelope::{
    ClientParameters, Command, OptFlag, ServerData, CLIENT_FIELD, IDS_FIELD, PIDS_FIELD,
    SERVER_FIELD, URS_FIELD,
};
pub use error::WireError;
pub use reply::ServerReply;
pub use tif::Tif;
pub use url::{SqrlUrl, UrlAndNut, UrlFactory};
