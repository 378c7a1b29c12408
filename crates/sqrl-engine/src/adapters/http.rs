//! HTTP driving adapter.
//!
//! A deliberately thin axum surface: routing, form decoding, and status
//! mapping. Session cookies, HTML, and QR rendering belong to the site
//! scaffolding, not here.

use crate::domain::entities::RequestMeta;
use crate::domain::registry::NutRegistry;
use crate::ports::inbound::{LoginPollApi, PollOutcome, SqrlProtocolApi};
use crate::ports::outbound::IdentityStore;
use crate::service::ProtocolEngine;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Build the router: the SQRL POST endpoint at the configured path and the
/// login poll at `/pollNut/:nut`.
pub fn router<S: IdentityStore + 'static>(engine: Arc<ProtocolEngine<S>>) -> Router {
    let sqrl_path = engine.config().url_path.clone();
    Router::new()
        .route(&sqrl_path, post(handle_sqrl::<S>))
        .route("/pollNut/:nut", get(poll_nut::<S>))
        .with_state(engine)
}

async fn handle_sqrl<S: IdentityStore + 'static>(
    State(engine): State<Arc<ProtocolEngine<S>>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let meta = RequestMeta {
        remote_addr: connect_info.map(|ConnectInfo(addr)| addr.to_string()),
    };
    let reply = engine.handle(&fields, meta).await;
    let status =
        StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, reply.body).into_response()
}

async fn poll_nut<S: IdentityStore + 'static>(
    State(engine): State<Arc<ProtocolEngine<S>>>,
    Path(nut): Path<String>,
) -> Response {
    match engine.poll(&nut).await {
        PollOutcome::UnknownNut => StatusCode::NOT_FOUND.into_response(),
        PollOutcome::Pending => Json(serde_json::json!({ "loggedIn": false })).into_response(),
        PollOutcome::Complete { redirect_to } => Json(serde_json::json!({
            "loggedIn": true,
            "redirectTo": redirect_to,
        }))
        .into_response(),
    }
}

/// Periodically evict expired nut records.
pub fn spawn_registry_sweeper(registry: Arc<NutRegistry>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // the first tick fires immediately
        loop {
            interval.tick().await;
            registry.sweep();
        }
    })
}

/// Install a fmt subscriber honoring `RUST_LOG`, defaulting to `info`.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
