//! HTTP server exposing the issuance endpoint
//!
//! Routes:
//! - `GET|POST /token?name=&namespace=` - issue and deliver a wrapped token;
//!   `202` on success, error message in the body on failure
//! - `GET /healthz` - liveness probe
//!
//! Each inbound request runs on its own tokio task; the handler itself is
//! shared immutable state.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{info, warn};

use crate::issue::{IssuanceHandler, IssuanceRequest};

/// Build the issuance router with a shared handler state
pub fn routes(handler: Arc<IssuanceHandler>) -> Router {
    Router::new()
        .route("/token", get(issue_token).post(issue_token))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(handler)
}

/// Handle `GET|POST /token` - validate, issue, and dispatch delivery
async fn issue_token(
    State(handler): State<Arc<IssuanceHandler>>,
    Query(request): Query<IssuanceRequest>,
) -> Response {
    match handler.handle(request).await {
        Ok(status) => status.into_response(),
        Err(e) => {
            warn!(error = %e, status = %e.status(), "token request failed");
            e.into_response()
        }
    }
}

/// Bind the listener and serve the issuance router until shutdown
pub async fn serve(addr: SocketAddr, handler: Arc<IssuanceHandler>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "issuance server listening");
    axum::serve(listener, routes(handler)).await
}
