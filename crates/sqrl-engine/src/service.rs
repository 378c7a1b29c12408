//! The protocol engine service: wires validation, the nut registry, and the
//! identity store into the per-request algorithm.

use crate::domain::config::EngineConfig;
use crate::domain::entities::RequestMeta;
use crate::domain::errors::ProtocolError;
use crate::domain::nut::{NutGenerator, RandomNutGenerator};
use crate::domain::registry::NutRegistry;
use crate::domain::validator;
use crate::ports::inbound::{LoginPollApi, PollOutcome, SqrlHttpResponse, SqrlProtocolApi};
use crate::ports::outbound::IdentityStore;
use async_trait::async_trait;
use sqrl_wire::{Command, ServerReply, UrlAndNut, UrlFactory};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A failed request, together with the follow-up nut the reply must carry.
///
/// Once `consume_and_issue` has run, the presented nut is spent and its
/// successor is already registered with ancestry back to the conversation
/// origin. A failure after that point must hand back *that* nut, so the
/// retry stays in the same conversation and a browser polling the origin
/// still observes its completion. `retry_nut: None` means the conversation
/// never advanced and the reply may start a fresh one.
struct RequestFailure {
    err: ProtocolError,
    retry_nut: Option<UrlAndNut>,
}

impl From<ProtocolError> for RequestFailure {
    fn from(err: ProtocolError) -> Self {
        Self {
            err,
            retry_nut: None,
        }
    }
}

/// The SQRL protocol engine.
///
/// One instance serves one site. It owns the nut registry, the only
/// process-wide mutable state, and drives a caller-provided identity
/// store. Each call to [`SqrlProtocolApi::handle`] is an independent unit
/// of work; conversations are serialized by the single-use nut rule, not
/// by locks here.
pub struct ProtocolEngine<S> {
    store: Arc<S>,
    registry: Arc<NutRegistry>,
    factory: UrlFactory,
    generator: Arc<dyn NutGenerator>,
    config: EngineConfig,
}

impl<S: IdentityStore> ProtocolEngine<S> {
    /// Create an engine with the default 128-bit random nut generator.
    pub fn new(config: EngineConfig, store: Arc<S>) -> Self {
        Self::with_generator(config, store, Arc::new(RandomNutGenerator))
    }

    /// Create an engine with a caller-supplied nut generator.
    pub fn with_generator(
        config: EngineConfig,
        store: Arc<S>,
        generator: Arc<dyn NutGenerator>,
    ) -> Self {
        let factory = UrlFactory::new(
            config.local_domain_name.clone(),
            config.port,
            Some(config.url_path.as_str()),
            config.domain_extension,
        );
        let registry = Arc::new(NutRegistry::new(config.nut_ttl()));
        Self {
            store,
            registry,
            factory,
            generator,
            config,
        }
    }

    /// The nut registry, shared so adapters can run TTL sweeps.
    pub fn registry(&self) -> Arc<NutRegistry> {
        Arc::clone(&self.registry)
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mint and register an origin nut and the QR-code URL that carries it.
    /// This begins a conversation; the login page renders the result.
    pub async fn issue_login_url(&self) -> UrlAndNut {
        let issued = self.mint();
        self.registry
            .issue(&issued.nut, Some(issued.url.as_str()), None);
        if let Err(err) = self.store.nut_issued(&issued, None).await {
            warn!(%err, "identity store missed origin nut notification");
        }
        debug!(nut = %issued.nut, "origin nut issued");
        issued
    }

    fn mint(&self) -> UrlAndNut {
        self.factory
            .url_and_nut_from_bytes(&self.generator.generate())
    }

    fn next_query_path(&self, nut: &str) -> String {
        format!("{}?nut={}", self.config.url_path, nut)
    }

    async fn process(
        &self,
        fields: &HashMap<String, String>,
    ) -> Result<ServerReply, RequestFailure> {
        let request = validator::validate(fields)?;

        if request.protocol_version != 1 {
            return Err(ProtocolError::UnsupportedVersion(
                request.protocol_version.to_string(),
            )
            .into());
        }

        // Single-use claim on the presented nut, and in the same step the
        // successor is minted and registered with ancestry back to the
        // conversation origin. This happens before the store is consulted
        // so a concurrent poll of the origin sees consistent state.
        let next = self.mint();
        let record = self
            .registry
            .consume_and_issue(&request.nut, &next.nut, Some(next.url.as_str()))
            .ok_or_else(|| ProtocolError::UnknownNut(request.nut.clone()))?;
        let origin = record.origin_nut().to_string();

        // From here on, failure replies must carry `next`: it is the one
        // nut this invocation registered, and it is chained to the origin.
        self.store
            .nut_issued(&next, Some(origin.as_str()))
            .await
            .map_err(|e| RequestFailure {
                err: ProtocolError::TransientInternal(e.to_string()),
                retry_nut: Some(next.clone()),
            })?;

        let outcome = match request.command {
            Command::Query => self.store.query(&request, &record).await,
            Command::Ident => self.store.ident(&request, &record).await,
            Command::Disable => self.store.disable(&request, &record).await,
            Command::Enable => self.store.enable(&request, &record).await,
            Command::Remove => self.store.remove(&request, &record).await,
        }
        .map_err(|e| RequestFailure {
            err: ProtocolError::TransientInternal(e.to_string()),
            retry_nut: Some(next.clone()),
        })?;

        if request.command == Command::Ident && outcome.succeeded() {
            self.registry
                .mark_logged_in(&origin, request.identity_key());
            info!(origin = %origin, "login completed");
        }

        let mut reply = ServerReply::new(
            next.nut.clone(),
            outcome.tif_bits,
            self.next_query_path(&next.nut),
        );
        if request.client_provided_session && request.command != Command::Query {
            reply.success_url = Some(self.config.client_login_success_url.clone());
        }
        if request.return_session_unlock_key {
            reply.server_unlock_key = outcome.session_unlock_key.clone();
        }
        reply.secret_index = outcome.secret_index.clone();
        reply.cancel_url = self.config.client_cancel_auth_url.clone();

        debug!(
            cmd = %request.command,
            tif = %reply.tif,
            nut = %reply.nut,
            "reply composed"
        );
        Ok(reply)
    }

    /// Render a failure as a normally-framed reply. When the conversation
    /// had already advanced past `consume_and_issue`, the reply carries the
    /// successor nut that invocation registered (its ancestry intact);
    /// otherwise a fresh origin nut is minted so the client can retry the
    /// conversation from scratch.
    async fn failure_reply(&self, failure: RequestFailure) -> SqrlHttpResponse {
        let err = failure.err;
        warn!(%err, status = err.http_status(), "request failed");

        let next = match failure.retry_nut {
            Some(next) => next,
            None => {
                let next = self.mint();
                self.registry
                    .issue(&next.nut, Some(next.url.as_str()), None);
                if let Err(notify_err) = self.store.nut_issued(&next, None).await {
                    warn!(err = %notify_err, "identity store missed retry nut notification");
                }
                next
            }
        };

        let mut reply = ServerReply::new(
            next.nut.clone(),
            err.tif_bits(),
            self.next_query_path(&next.nut),
        );
        reply.ask = Some(err.to_string());
        reply.cancel_url = self.config.client_cancel_auth_url.clone();

        SqrlHttpResponse {
            status: err.http_status(),
            body: reply.to_base64(),
        }
    }
}

#[async_trait]
impl<S: IdentityStore> SqrlProtocolApi for ProtocolEngine<S> {
    async fn handle(
        &self,
        fields: &HashMap<String, String>,
        meta: RequestMeta,
    ) -> SqrlHttpResponse {
        if let Some(addr) = &meta.remote_addr {
            debug!(remote = %addr, "sqrl request");
        }
        match self.process(fields).await {
            Ok(reply) => SqrlHttpResponse {
                status: 200,
                body: reply.to_base64(),
            },
            Err(failure) => self.failure_reply(failure).await,
        }
    }
}

#[async_trait]
impl<S: IdentityStore> LoginPollApi for ProtocolEngine<S> {
    async fn poll(&self, nut: &str) -> PollOutcome {
        let record = match self.registry.lookup(nut) {
            Some(record) => record,
            None => return PollOutcome::UnknownNut,
        };
        if !record.logged_in {
            return PollOutcome::Pending;
        }
        let key = match record.client_primary_identity_public_key {
            Some(key) => key,
            None => return PollOutcome::Pending,
        };
        match self.store.get_identity(&key).await {
            Ok(Some(_)) => PollOutcome::Complete {
                redirect_to: self.config.client_login_success_url.clone(),
            },
            Ok(None) => {
                warn!(nut, "logged-in nut refers to an identity the store no longer has");
                PollOutcome::Pending
            }
            Err(err) => {
                warn!(nut, %err, "identity resolution failed during poll");
                PollOutcome::Pending
            }
        }
    }
}
