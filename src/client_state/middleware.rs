//! Axum layer that owns the client-state lifecycle: load the snapshots before
//! the handler runs, park the shared state in request extensions, and run the
//! single commit phase on the finished response before it is released.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::client_state::{ClientState, SharedClientState};
use crate::config::AuthConfig;

/// Wrap routes with `axum::middleware::from_fn_with_state(cfg, load_client_state)`.
///
/// Handlers reach the per-request state through
/// `Extension<SharedClientState>`. If the surrounding request is aborted the
/// response never comes back through here and the staged events are discarded,
/// which is the intended at-most-once commit policy.
pub async fn load_client_state(
    State(cfg): State<Arc<AuthConfig>>,
    mut req: Request,
    next: Next,
) -> Response {
    let state = match ClientState::load(&cfg.storage, cfg.keys.clone(), req.headers()) {
        Ok(state) => state,
        Err(err) => {
            error!("failed to load client state: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let shared: SharedClientState = state.into_shared();
    req.extensions_mut().insert(shared.clone());

    let mut res = next.run(req).await;

    // Finalize: the one and only flush of the event logs for this request.
    if let Err(err) = shared.lock().commit(res.headers_mut()) {
        error!("failed to write client state: {}", err);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    res
}
