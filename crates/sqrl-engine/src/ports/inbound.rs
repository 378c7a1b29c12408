//! Inbound ports: the public API of the protocol engine.

use crate::domain::entities::RequestMeta;
use async_trait::async_trait;
use std::collections::HashMap;

/// A transport-agnostic HTTP response: status plus the base64url reply body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqrlHttpResponse {
    /// HTTP status code to send.
    pub status: u16,
    /// Response body, already wire-encoded.
    pub body: String,
}

/// What a login poll learned about a nut.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The nut was never issued or has expired; transports answer 404.
    UnknownNut,
    /// The conversation has not completed login.
    Pending,
    /// A device finished `ident`; send the browser here.
    Complete {
        /// The configured post-login redirect.
        redirect_to: String,
    },
}

/// The protocol entry point: one verified-or-rejected exchange per call.
///
/// Implementations must be thread-safe (`Send + Sync`); requests are
/// processed as independent concurrent units of work.
#[async_trait]
pub trait SqrlProtocolApi: Send + Sync {
    /// Process one client POST. `fields` is the decoded
    /// `application/x-www-form-urlencoded` body. Never panics; failures
    /// come back as normally-framed SQRL replies with failure TIF bits.
    async fn handle(&self, fields: &HashMap<String, String>, meta: RequestMeta)
        -> SqrlHttpResponse;
}

/// The out-of-band polling channel a login page uses to learn that a
/// separate device completed authentication.
///
/// Polling only reads; it never advances protocol state.
#[async_trait]
pub trait LoginPollApi: Send + Sync {
    /// Report the login state of `nut`.
    async fn poll(&self, nut: &str) -> PollOutcome;
}
