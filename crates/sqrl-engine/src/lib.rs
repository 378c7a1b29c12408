//! # SQRL Protocol Engine
//!
//! Server-side state machine for SQRL (Secure Quick Reliable Login)
//! conversations: nut lifecycle, envelope validation, command dispatch, and
//! the out-of-band login poll.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): validation, nut registry, entities; no
//!   transport concerns
//! - **Ports Layer** (`ports/`): trait definitions for inbound (protocol,
//!   poll) and outbound (identity store) interfaces
//! - **Service Layer** (`service.rs`): the engine, wiring domain logic to
//!   ports
//! - **Adapters** (`adapters/`): an in-memory identity store and a thin
//!   axum HTTP surface
//!
//! ## Conversation shape
//!
//! A browser shows a QR code containing `sqrl://…?nut=<origin>`. A client
//! (same device or a phone) POSTs a signed `query`, receives a fresh nut,
//! and continues the conversation one nut per round trip until `ident`
//! flips the *origin* record to logged-in. The browser, meanwhile, polls
//! the origin nut until that flip is visible.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use domain::config::EngineConfig;
pub use domain::entities::{
    AuthOutcome, ClientRequest, IdentityKey, IdentityRecord, NutRecord, RequestMeta,
};
pub use domain::errors::ProtocolError;
pub use domain::nut::{NutGenerator, RandomNutGenerator};
pub use domain::registry::NutRegistry;
pub use ports::inbound::{LoginPollApi, PollOutcome, SqrlHttpResponse, SqrlProtocolApi};
pub use ports::outbound::{IdentityStore, StoreError};
pub use service::ProtocolEngine;
