//! Serving adapter behavior, driven through the routers without a socket.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use skein_bundler::{
    ArtifactLoader, Bundler, BundlerConfig, CompileStats, Driver, DriverOptions, Register,
    RenderContext, RenderEngine, RenderError, Result,
};
use skein_cli::dev::{self, BundleCache, DevServerState};
use skein_cli::serve::{self, SsrState};
use tempfile::TempDir;
use tower::ServiceExt;

struct FixedBundler(Vec<String>);

#[async_trait]
impl Bundler for FixedBundler {
    async fn compile(&self, _configs: &[BundlerConfig]) -> Result<CompileStats> {
        Ok(CompileStats {
            errors: self.0.clone(),
            ..CompileStats::default()
        })
    }
}

/// Routes a few URLs to each render outcome.
struct FakeEngine;

#[async_trait]
impl RenderEngine for FakeEngine {
    async fn render(&self, context: &RenderContext) -> std::result::Result<String, RenderError> {
        match context.url.as_str() {
            "/old" => Err(RenderError::Redirect("/new".into())),
            "/boom" => Err(RenderError::Failed {
                message: "window is not defined".into(),
                stack: Some("ReferenceError: window is not defined\n    at app.js:1:1".into()),
            }),
            url if url.starts_with("/items") => Ok(format!(
                "<html><head><title>{}</title></head><body>{url}</body></html>",
                context.title
            )),
            _ => Err(RenderError::NotFound),
        }
    }
}

#[derive(Clone)]
struct Fixed<A>(A);

#[async_trait]
impl<A: Clone + Send + Sync + 'static> ArtifactLoader for Fixed<A> {
    type Artifact = A;

    async fn load(&self, _stats: &CompileStats) -> Result<A> {
        Ok(self.0.clone())
    }
}

/// Register filled by one real single-shot driver cycle.
async fn compiled<A: Clone + Send + Sync + 'static>(artifact: A, errors: &[&str]) -> Arc<Register<A>> {
    let bundler = Arc::new(FixedBundler(errors.iter().map(|e| e.to_string()).collect()));
    let (driver, ready) = Driver::spawn(bundler, Fixed(artifact), Vec::new(), DriverOptions::default());
    let _ = ready.wait().await;
    let register = driver.register();
    driver.finished().await;
    register
}

async fn get(router: Router, uri: &str, accept: Option<&str>) -> (StatusCode, String, Option<String>) {
    let mut request = Request::builder().uri(uri);
    if let Some(accept) = accept {
        request = request.header(header::ACCEPT, accept);
    }
    let response = router
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(body.to_vec()).unwrap();
    (status, body, location.or(content_type))
}

fn output_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("assets/js")).unwrap();
    std::fs::create_dir_all(temp.path().join(".ssr")).unwrap();
    std::fs::write(temp.path().join("assets/js/main.js"), "console.log('client')").unwrap();
    std::fs::write(temp.path().join(".ssr/ssr-server-bundle.json"), r#"{"entry":"main.js"}"#).unwrap();
    temp
}

async fn ssr_router(output: &TempDir) -> Router {
    let engine: Arc<dyn RenderEngine> = Arc::new(FakeEngine);
    let register = compiled(engine, &[]).await;
    serve::build_router(SsrState::new(register), output.path().to_path_buf())
}

#[tokio::test]
async fn ssr_renders_html() {
    let output = output_dir();
    let (status, body, content_type) = get(ssr_router(&output).await, "/items/7?sort=asc", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(body.contains("<title>Skein App</title>"));
    assert!(body.contains("/items/7?sort=asc"));
}

#[tokio::test]
async fn ssr_serves_static_files_first() {
    let output = output_dir();
    let (status, body, _) = get(ssr_router(&output).await, "/assets/js/main.js", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "console.log('client')");
}

#[tokio::test]
async fn ssr_prefers_gzipped_assets() {
    let output = output_dir();
    std::fs::write(output.path().join("assets/js/main.js.gz"), b"gz").unwrap();
    let router = ssr_router(&output).await;

    let request = Request::builder()
        .uri("/assets/js/main.js")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
}

#[tokio::test]
async fn ssr_never_serves_hidden_build_files() {
    let output = output_dir();
    let (status, body, _) = get(ssr_router(&output).await, "/.ssr/ssr-server-bundle.json", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Page Not Found");
}

#[tokio::test]
async fn ssr_never_serves_percent_encoded_hidden_files() {
    let output = output_dir();
    for uri in [
        "/%2Essr/ssr-server-bundle.json",
        "/%2essr/ssr-server-bundle.json",
        "/%2E%73sr/ssr-server-bundle.json",
    ] {
        let (status, body, _) = get(ssr_router(&output).await, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(!body.contains("main.js"), "{uri}");
    }
}

#[tokio::test]
async fn ssr_redirects_with_302() {
    let output = output_dir();
    let (status, _, location) = get(ssr_router(&output).await, "/old", None).await;

    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location.as_deref(), Some("/new"));
}

#[tokio::test]
async fn ssr_not_found_is_404() {
    let output = output_dir();
    let (status, body, content_type) = get(ssr_router(&output).await, "/nowhere", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Page Not Found");
    assert_eq!(content_type.as_deref(), Some("text/html; charset=utf-8"));
}

#[tokio::test]
async fn ssr_failure_hides_the_stack() {
    let output = output_dir();
    let (status, body, content_type) = get(ssr_router(&output).await, "/boom", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type.as_deref(), Some("text/html; charset=utf-8"));
    assert_eq!(body, "Internal Server Error");
    assert!(!body.contains("ReferenceError"));
}

#[tokio::test]
async fn ssr_without_engine_is_unavailable() {
    let output = output_dir();
    let register: Arc<Register<Arc<dyn RenderEngine>>> = Arc::new(Register::new());
    let router = serve::build_router(SsrState::new(register), output.path().to_path_buf());

    let (status, _, content_type) = get(router, "/items", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(content_type.as_deref(), Some("text/html; charset=utf-8"));
}

#[tokio::test]
async fn ssr_after_terminal_failure_is_500() {
    let output = output_dir();
    let engine: Arc<dyn RenderEngine> = Arc::new(FakeEngine);
    let register = compiled(engine, &["Module not found: ./App.vue"]).await;
    assert!(register.snapshot().terminal);
    let router = serve::build_router(SsrState::new(register), output.path().to_path_buf());

    let (status, _, _) = get(router, "/items", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

fn dev_bundle() -> Arc<BundleCache> {
    let mut bundle = BundleCache::new();
    bundle.insert(
        "/index.html".into(),
        b"<html><body><div id=\"app\"></div></body></html>".to_vec(),
        "text/html; charset=utf-8".into(),
    );
    bundle.insert(
        "/assets/js/main.js".into(),
        b"console.log('dev')".to_vec(),
        "application/javascript".into(),
    );
    Arc::new(bundle)
}

async fn dev_router() -> Router {
    let register = compiled(dev_bundle(), &[]).await;
    dev::build_router(Arc::new(DevServerState::new(register)))
}

#[tokio::test]
async fn dev_serves_bundle_from_memory() {
    let (status, body, content_type) = get(dev_router().await, "/assets/js/main.js", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "console.log('dev')");
    assert_eq!(content_type.as_deref(), Some("application/javascript"));
}

#[tokio::test]
async fn dev_history_fallback_serves_index_with_reload_script() {
    let (status, body, _) = get(dev_router().await, "/users/42", Some("text/html")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<div id=\"app\"></div>"));
    assert!(body.contains("/__skein_reload__.js"));
}

#[tokio::test]
async fn dev_missing_file_is_404() {
    let (status, _, _) = get(dev_router().await, "/assets/js/missing.js", Some("text/html")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dev_serves_the_reload_client() {
    let (status, body, content_type) = get(dev_router().await, "/__skein_reload__.js", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/javascript"));
    assert!(body.contains("/__skein_hmr__"));
}

#[tokio::test]
async fn dev_before_first_compile_is_unavailable() {
    let router = dev::build_router(Arc::new(DevServerState::new(Arc::new(Register::new()))));
    let (status, _, _) = get(router, "/", Some("text/html")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
