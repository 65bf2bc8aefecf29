//! Production serving: static files from the output directory, then
//! server-side rendering for everything else.
//!
//! Both servers share the gating rule for requests that arrive without a
//! servable artifact: `500` once the build has failed for good, `503` while
//! one may still arrive.

mod ssr;

pub use ssr::{SsrServer, SsrState, build_router};

use std::future::Future;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use skein_bundler::Snapshot;
use tokio::net::TcpListener;

use crate::error::{CliError, Result};

/// Bind the listener for `host:port`; hostnames are resolved.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .map_err(|e| CliError::Server(format!("Failed to bind to {host}:{port}: {e}")))
}

/// Response for a request that arrives before any artifact loaded.
pub fn unavailable<A>(snapshot: &Snapshot<A>) -> Response {
    if snapshot.error.is_some() && snapshot.terminal {
        page(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    } else {
        page(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
    }
}

/// Status page with an HTML content type.
pub fn page(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response()
}

/// Resolves on Ctrl+C.
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
