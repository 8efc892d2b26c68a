//! Route table for the handshake: `GET {mount}/oauth2/{provider}` starts the
//! flow, `GET {mount}/oauth2/callback/{provider}` finishes it.

use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;
use tracing::error;

use crate::client_state::{load_client_state, SharedClientState};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::oauth2::flow;

fn error_response(err: AuthError) -> Response {
    error!("oauth2 request error: {}", err);
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "status": "error", "error": err.to_string() }))).into_response()
}

async fn start_handler(
    State(cfg): State<Arc<AuthConfig>>,
    Extension(state): Extension<SharedClientState>,
    Path(provider): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    match flow::start(&cfg, &state, &provider, query.as_deref().unwrap_or("")).await {
        Ok(res) => res,
        Err(err) => error_response(err),
    }
}

async fn end_handler(
    State(cfg): State<Arc<AuthConfig>>,
    Extension(state): Extension<SharedClientState>,
    Path(provider): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    match flow::end(&cfg, &state, &provider, query.as_deref().unwrap_or("")).await {
        Ok(res) => res,
        Err(err) => error_response(err),
    }
}

/// The bare oauth2 routes, relative to the mount point. Use this when the host
/// application already wraps its router with `load_client_state`.
pub fn router(cfg: Arc<AuthConfig>) -> Router {
    Router::new()
        .route("/oauth2/{provider}", get(start_handler))
        .route("/oauth2/callback/{provider}", get(end_handler))
        .with_state(cfg)
}

/// The oauth2 routes nested under the configured mount path and wrapped with
/// the client-state load/commit middleware.
pub fn mount(cfg: Arc<AuthConfig>) -> Router {
    let prefix = cfg.mount_path.clone();
    Router::new()
        .nest(&prefix, router(cfg.clone()))
        .layer(axum::middleware::from_fn_with_state(cfg, load_client_state))
}
