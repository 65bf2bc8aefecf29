use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{MethodRouter, get},
};
use skein_bundler::{RenderContext, RenderEngine, RenderError, Register};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::{bind, page, unavailable};
use crate::error::{CliError, Result};
use crate::logger::LogContext;
use crate::ui;

/// What the SSR handlers read: the driver's register.
#[derive(Clone)]
pub struct SsrState {
    register: Arc<Register<Arc<dyn RenderEngine>>>,
}

impl SsrState {
    pub fn new(register: Arc<Register<Arc<dyn RenderEngine>>>) -> Self {
        Self { register }
    }
}

/// Production server over the output directory.
pub struct SsrServer {
    host: String,
    port: u16,
    output_path: PathBuf,
    state: SsrState,
    log: LogContext,
}

impl SsrServer {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        output_path: PathBuf,
        state: SsrState,
        log: LogContext,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            output_path,
            state,
            log,
        }
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn start(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let listener = bind(&self.host, self.port).await?;
        if self.log.announces() {
            let addr = listener.local_addr()?;
            ui::success(&format!("Server running at http://{addr}"));
        }

        axum::serve(listener, build_router(self.state, self.output_path))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| CliError::Server(e.to_string()))
    }
}

/// Static files first; whatever they do not answer is rendered.
///
/// Hidden paths such as the `.ssr` manifests are never served as files.
/// Gzipped siblings written by the client build are preferred when the
/// request accepts them.
pub fn build_router(state: SsrState, output_path: PathBuf) -> Router {
    let render: MethodRouter = get(handle_render).with_state(state.clone());
    let files = ServeDir::new(output_path)
        .append_index_html_on_directories(false)
        .precompressed_gzip()
        .fallback(render);

    Router::new()
        .fallback_service(files)
        .layer(middleware::from_fn_with_state(state, skip_hidden))
        .layer(TraceLayer::new_for_http())
}

async fn skip_hidden(State(state): State<SsrState>, request: Request, next: Next) -> Response {
    if is_hidden(request.uri().path()) {
        return render(&state, request.uri()).await;
    }
    next.run(request).await
}

/// Checked on the decoded path, the form `ServeDir` resolves against disk.
/// Paths that do not decode to UTF-8 count as hidden.
fn is_hidden(path: &str) -> bool {
    match urlencoding::decode(path) {
        Ok(decoded) => decoded
            .split(['/', '\\'])
            .any(|segment| segment.starts_with('.')),
        Err(_) => true,
    }
}

async fn handle_render(State(state): State<SsrState>, uri: Uri) -> Response {
    render(&state, &uri).await
}

async fn render(state: &SsrState, uri: &Uri) -> Response {
    let snapshot = state.register.snapshot();
    let Some(engine) = snapshot.artifact.as_ref() else {
        return unavailable(&snapshot);
    };

    let url = uri.path_and_query().map_or("/", |pq| pq.as_str());
    match engine.render(&RenderContext::new(url)).await {
        Ok(html) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response(),
        Err(RenderError::Redirect(location)) => {
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
        Err(RenderError::NotFound) => page(StatusCode::NOT_FOUND, "Page Not Found"),
        Err(RenderError::Failed { message, stack }) => {
            tracing::error!(url, stack = stack.as_deref().unwrap_or(""), "render failed: {message}");
            page(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_segments_are_hidden() {
        assert!(is_hidden("/.ssr/ssr-server-bundle.json"));
        assert!(is_hidden("/assets/.cache"));
        assert!(!is_hidden("/assets/js/main.3f2a.js"));
        assert!(!is_hidden("/"));
    }

    #[test]
    fn encoded_dot_segments_are_hidden() {
        assert!(is_hidden("/%2Essr/ssr-server-bundle.json"));
        assert!(is_hidden("/%2essr/ssr-client-manifest.json"));
        assert!(is_hidden("/assets%2F.cache/x"));
        assert!(is_hidden("/%FF%FE"));
        assert!(!is_hidden("/items%20list"));
    }
}
