//! In-memory identity store.
//!
//! The reference implementation of the [`IdentityStore`] contract, used by
//! the test suite and by demo deployments. Production sites put a database
//! behind the same trait; the command semantics here (rotation, idempotent
//! state transitions, remove-requires-disabled) are the contract's
//! reference behavior.

use crate::domain::entities::{AuthOutcome, ClientRequest, IdentityKey, IdentityRecord, NutRecord};
use crate::ports::outbound::{IdentityStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use sqrl_wire::{Tif, UrlAndNut};
use std::time::Instant;
use tracing::debug;

/// Identity records and mirrored nut state, all in process memory.
#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: DashMap<IdentityKey, IdentityRecord>,
    nuts: DashMap<String, NutRecord>,
    secret_index: Option<String>,
}

impl MemoryIdentityStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that asks every identified client for the indexed secret
    /// under `secret_index` (returned as `sin=` for the client to answer
    /// with `ins`).
    pub fn with_secret_index(secret_index: impl Into<String>) -> Self {
        Self {
            secret_index: Some(secret_index.into()),
            ..Self::default()
        }
    }

    /// Number of identities held.
    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    /// Seed an identity directly (test setup).
    pub fn insert_identity(&self, record: IdentityRecord) {
        self.identities
            .insert(record.primary_identity_public_key, record);
    }

    fn suk_if_requested(request: &ClientRequest, identity: &IdentityRecord) -> Option<String> {
        request
            .return_session_unlock_key
            .then(|| identity.session_unlock_key.clone())
            .flatten()
    }

    /// Fold the client's deposited keys and advice flags into a record.
    fn absorb_client_material(record: &mut IdentityRecord, request: &ClientRequest) {
        if let Some(suk) = &request.server_unlock_public_key {
            record.session_unlock_key = Some(suk.clone());
        }
        if let Some(vuk) = &request.server_verify_unlock_public_key {
            record.verify_unlock_key = Some(vuk.clone());
        }
        record.sqrl_only = request.sqrl_only;
        record.hard_lock = request.hard_lock;
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn nut_issued(
        &self,
        issued: &UrlAndNut,
        origin_nut: Option<&str>,
    ) -> Result<(), StoreError> {
        self.nuts.insert(
            issued.nut.clone(),
            NutRecord {
                nut: issued.nut.clone(),
                url: Some(issued.url.clone()),
                created_at: Instant::now(),
                original_login_nut: origin_nut.map(str::to_string),
                logged_in: false,
                client_primary_identity_public_key: None,
                consumed: false,
            },
        );
        Ok(())
    }

    async fn get_nut_info(&self, nut: &str) -> Result<Option<NutRecord>, StoreError> {
        Ok(self.nuts.get(nut).map(|r| r.clone()))
    }

    async fn query(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        if let Some(identity) = self.identities.get(&request.identity_key()) {
            let mut tif = Tif::CURRENT_ID_MATCH;
            if identity.disabled {
                tif |= Tif::ID_DISABLED;
            }
            return Ok(AuthOutcome {
                session_unlock_key: Self::suk_if_requested(request, &identity),
                user: Some(identity.clone()),
                tif_bits: tif,
                secret_index: self.secret_index.clone(),
            });
        }

        if let Some(previous) = request.previous_identity_key() {
            if let Some(identity) = self.identities.get(&previous) {
                let mut tif = Tif::PREVIOUS_ID_MATCH;
                if identity.disabled {
                    tif |= Tif::ID_DISABLED;
                }
                return Ok(AuthOutcome {
                    session_unlock_key: Self::suk_if_requested(request, &identity),
                    user: Some(identity.clone()),
                    tif_bits: tif,
                    secret_index: self.secret_index.clone(),
                });
            }
        }

        Ok(AuthOutcome::default())
    }

    async fn ident(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        let idk = request.identity_key();

        // Known identity: accept the login, absorb fresh client material.
        if let Some(mut identity) = self.identities.get_mut(&idk) {
            if identity.disabled {
                return Ok(AuthOutcome {
                    user: Some(identity.clone()),
                    tif_bits: Tif::COMMAND_FAILED | Tif::ID_DISABLED,
                    session_unlock_key: None,
                    secret_index: None,
                });
            }
            Self::absorb_client_material(&mut identity, request);
            return Ok(AuthOutcome {
                session_unlock_key: Self::suk_if_requested(request, &identity),
                user: Some(identity.clone()),
                tif_bits: Tif::CURRENT_ID_MATCH,
                secret_index: self.secret_index.clone(),
            });
        }

        // Key rotation: the previous key matches an existing primary.
        if let Some(previous) = request.previous_identity_key() {
            if let Some((_, mut identity)) = self.identities.remove(&previous) {
                if identity.disabled {
                    // Put it back untouched; a disabled identity cannot rotate.
                    self.identities.insert(previous, identity.clone());
                    return Ok(AuthOutcome {
                        user: Some(identity),
                        tif_bits: Tif::COMMAND_FAILED | Tif::ID_DISABLED,
                        session_unlock_key: None,
                        secret_index: None,
                    });
                }
                if !identity.previous_identity_public_keys.contains(&previous) {
                    identity.previous_identity_public_keys.insert(0, previous);
                }
                identity.primary_identity_public_key = idk;
                Self::absorb_client_material(&mut identity, request);
                self.identities.insert(idk, identity.clone());
                debug!("identity key rotated");
                return Ok(AuthOutcome {
                    session_unlock_key: Self::suk_if_requested(request, &identity),
                    user: Some(identity),
                    tif_bits: Tif::CURRENT_ID_MATCH | Tif::PREVIOUS_ID_MATCH,
                    secret_index: self.secret_index.clone(),
                });
            }
        }

        // Unknown identity: create it.
        let mut identity = IdentityRecord {
            primary_identity_public_key: idk,
            ..IdentityRecord::default()
        };
        Self::absorb_client_material(&mut identity, request);
        self.identities.insert(idk, identity.clone());
        debug!("identity created");
        Ok(AuthOutcome {
            session_unlock_key: Self::suk_if_requested(request, &identity),
            user: Some(identity),
            tif_bits: Tif::empty(),
            secret_index: self.secret_index.clone(),
        })
    }

    async fn disable(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        match self.identities.get_mut(&request.identity_key()) {
            Some(mut identity) => {
                identity.disabled = true;
                Ok(AuthOutcome {
                    user: Some(identity.clone()),
                    tif_bits: Tif::CURRENT_ID_MATCH | Tif::ID_DISABLED,
                    session_unlock_key: None,
                    secret_index: None,
                })
            }
            None => Ok(AuthOutcome::with_tif(Tif::COMMAND_FAILED)),
        }
    }

    async fn enable(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        match self.identities.get_mut(&request.identity_key()) {
            Some(mut identity) => {
                identity.disabled = false;
                Ok(AuthOutcome {
                    user: Some(identity.clone()),
                    tif_bits: Tif::CURRENT_ID_MATCH,
                    session_unlock_key: None,
                    secret_index: None,
                })
            }
            None => Ok(AuthOutcome::with_tif(Tif::COMMAND_FAILED)),
        }
    }

    async fn remove(
        &self,
        request: &ClientRequest,
        _nut: &NutRecord,
    ) -> Result<AuthOutcome, StoreError> {
        let idk = request.identity_key();
        match self.identities.get(&idk).map(|i| i.disabled) {
            // Removing an identity that is already gone is a retried
            // remove; report success without a match.
            None => Ok(AuthOutcome::default()),
            Some(false) => Ok(AuthOutcome::with_tif(Tif::COMMAND_FAILED)),
            Some(true) => {
                self.identities.remove(&idk);
                debug!("identity removed");
                Ok(AuthOutcome::with_tif(Tif::CURRENT_ID_MATCH))
            }
        }
    }

    async fn get_identity(
        &self,
        key: &IdentityKey,
    ) -> Result<Option<IdentityRecord>, StoreError> {
        Ok(self.identities.get(key).map(|i| i.clone()))
    }
}
