//! Outbound ports: the identity-store collaborator contract.

use crate::domain::entities::{AuthOutcome, ClientRequest, IdentityKey, IdentityRecord, NutRecord};
use async_trait::async_trait;
use sqrl_wire::UrlAndNut;
use thiserror::Error;

/// Failures crossing the store boundary. The engine folds these into a
/// transient-error reply; the store is responsible for idempotence on the
/// retry that follows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached or failed mid-operation.
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
}

/// Durable identity storage, implemented outside the core.
///
/// The engine owns nut lifecycle; the store owns identity records,
/// idempotence of the mutating commands, and the disabled-state policy
/// (`remove` only applies to a disabled identity).
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// A nut was handed to a client. Durable stores mirror it here;
    /// in-memory deployments may ignore the call.
    async fn nut_issued(
        &self,
        issued: &UrlAndNut,
        origin_nut: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Retrieve mirrored nut state, when the store keeps it.
    async fn get_nut_info(&self, nut: &str) -> Result<Option<NutRecord>, StoreError>;

    /// Read-only identity probe: which of the presented keys are known,
    /// and is the identity disabled.
    async fn query(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Create, update, or rotate the identity and accept the login.
    async fn ident(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Disable SQRL authentication for the identity. Idempotent.
    async fn disable(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Re-enable a disabled identity. Idempotent.
    async fn enable(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Remove the identity. Idempotent; refused unless currently disabled.
    async fn remove(
        &self,
        request: &ClientRequest,
        nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError>;

    /// Resolve an identity by primary key; the poll path uses this to hand
    /// the session collaborator a concrete identity.
    async fn get_identity(&self, key: &IdentityKey)
        -> Result<Option<IdentityRecord>, StoreError>;
}
