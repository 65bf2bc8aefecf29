//! Development server with reload notifications over server-sent events.
//!
//! Serves the latest in-memory bundle. HTML navigations without a file
//! extension fall back to `/index.html`, and every HTML response carries the
//! reload client script.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
    routing::get,
};
use rust_embed::RustEmbed;
use skein_bundler::DriverEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::state::{BundleCache, SharedState};
use crate::error::Result;
use crate::logger::LogContext;
use crate::serve::{bind, page, unavailable};
use crate::ui;

pub const HMR_PATH: &str = "/__skein_hmr__";
pub const RELOAD_SCRIPT_PATH: &str = "/__skein_reload__.js";
pub const HISTORY_INDEX: &str = "/index.html";

#[derive(RustEmbed)]
#[folder = "assets"]
struct ClientAssets;

pub struct DevServer {
    host: String,
    port: u16,
    state: SharedState,
    log: LogContext,
}

impl DevServer {
    pub fn new(host: impl Into<String>, port: u16, state: SharedState, log: LogContext) -> Self {
        Self {
            host: host.into(),
            port,
            state,
            log,
        }
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn start(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = bind(&self.host, self.port).await?;
        if self.log.announces() {
            let addr = listener.local_addr()?;
            ui::success(&format!("Development server running at http://{addr}"));
        }

        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| crate::error::CliError::Server(e.to_string()))
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route(HMR_PATH, get(handle_sse))
        .route(RELOAD_SCRIPT_PATH, get(handle_reload_script))
        .fallback(handle_request)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Relay driver events to connected browsers until the driver goes away.
pub async fn forward_events(state: SharedState, mut events: broadcast::Receiver<DriverEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => state.broadcast(&event).await,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "reload relay fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn handle_sse(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let (id, rx) = state.register_client();
    tracing::debug!(id, "reload client connected");

    let stream = ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

async fn handle_reload_script() -> Response {
    match ClientAssets::get("reload-client.js") {
        Some(asset) => (
            [
                (header::CONTENT_TYPE, "application/javascript"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            asset.data.into_owned(),
        )
            .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response(),
    }
}

async fn handle_request(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let snapshot = state.snapshot();
    let Some(bundle) = snapshot.artifact.as_ref() else {
        return unavailable(&snapshot);
    };

    let requested = uri.path();
    let path = history_fallback(&method, requested, &headers).unwrap_or(requested);

    match lookup(bundle, path) {
        Some((content, content_type)) => {
            let body = inject_reload_script(content, content_type);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type.as_str())
                .header(header::CACHE_CONTROL, "no-cache")
                .body(Body::from(body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        None => page(StatusCode::NOT_FOUND, "Page Not Found"),
    }
}

fn lookup<'a>(bundle: &'a BundleCache, path: &str) -> Option<&'a (Vec<u8>, String)> {
    bundle.get(path).or_else(|| {
        path.ends_with('/')
            .then(|| bundle.get(&format!("{path}index.html")))
            .flatten()
    })
}

/// `/index.html` for HTML navigations to extensionless paths.
///
/// Only `GET` and `HEAD` requests that accept HTML are rewritten; anything
/// whose last segment contains a dot is treated as a file request.
pub fn history_fallback(method: &Method, path: &str, headers: &HeaderMap) -> Option<&'static str> {
    if method != Method::GET && method != Method::HEAD {
        return None;
    }

    let accepts_html = headers
        .get(header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html") || accept.contains("*/*"));
    if !accepts_html {
        return None;
    }

    let last_segment = path.rsplit('/').next().unwrap_or("");
    if last_segment.contains('.') {
        return None;
    }
    Some(HISTORY_INDEX)
}

/// Add the reload client before `</body>`, or at the end.
fn inject_reload_script(content: &[u8], content_type: &str) -> Vec<u8> {
    if !content_type.starts_with("text/html") {
        return content.to_vec();
    }

    let html = String::from_utf8_lossy(content);
    let script_tag = format!(r#"<script src="{RELOAD_SCRIPT_PATH}"></script>"#);

    if let Some(pos) = html.rfind("</body>") {
        let mut result = String::with_capacity(html.len() + script_tag.len() + 4);
        result.push_str(&html[..pos]);
        result.push_str(&script_tag);
        result.push_str(&html[pos..]);
        return result.into_bytes();
    }

    let mut result = html.into_owned();
    result.push_str(&script_tag);
    result.into_bytes()
}
