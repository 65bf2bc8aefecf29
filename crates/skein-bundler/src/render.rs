//! The server-side rendering seam.
//!
//! A [`RendererFactory`] builds a [`RenderEngine`] from the emitted server
//! bundle, client manifest and page template. Missing or malformed inputs
//! fail at construction so a broken build never reaches request handling.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_config::Derivations;
use skein_config::graph::selectors::{
    CONTEXT, RENDERER_COMMAND, SSR_CLIENT_PATH, SSR_SERVER_PATH, TEMPLATE,
};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::compiler::CompileStats;
use crate::driver::ArtifactLoader;
use crate::error::{BundlerError, Result};

/// Marker the template must contain; rendered markup replaces it.
pub const OUTLET: &str = "<!--vue-ssr-outlet-->";

/// Page title handed to every render.
pub const DEFAULT_TITLE: &str = "Skein App";

/// Per-request render input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderContext {
    pub title: String,
    pub url: String,
}

impl RenderContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            url: url.into(),
        }
    }
}

/// Request-scoped render failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("redirect to {0}")]
    Redirect(String),

    #[error("page not found")]
    NotFound,

    #[error("render failed: {message}")]
    Failed {
        message: String,
        stack: Option<String>,
    },
}

#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render(&self, context: &RenderContext) -> std::result::Result<String, RenderError>;
}

/// Where the renderer's inputs live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererOptions {
    pub server_bundle: PathBuf,
    pub client_manifest: PathBuf,
    pub template: PathBuf,
    /// Directory the server bundle resolves its externals from.
    pub basedir: PathBuf,
}

impl RendererOptions {
    pub fn from_derivations(d: &Derivations) -> Result<Self> {
        Ok(Self {
            server_bundle: d.get(&SSR_SERVER_PATH)?,
            client_manifest: d.get(&SSR_CLIENT_PATH)?,
            template: d.get(&TEMPLATE)?,
            basedir: d.get(&CONTEXT)?,
        })
    }
}

#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn create(&self, options: &RendererOptions) -> Result<Arc<dyn RenderEngine>>;
}

/// Validated renderer inputs.
#[derive(Debug, Clone)]
pub struct RendererInputs {
    pub server_bundle: Value,
    pub client_manifest: Value,
    pub template: String,
}

impl RendererInputs {
    /// Read and check the server bundle manifest, client manifest and
    /// template.
    pub async fn read(options: &RendererOptions) -> Result<Self> {
        let server_bundle = read_json("server bundle", &options.server_bundle).await?;
        if server_bundle.get("entry").and_then(Value::as_str).is_none() {
            return Err(BundlerError::MalformedArtifact {
                what: "server bundle",
                path: options.server_bundle.clone(),
                reason: "no entry".to_string(),
            });
        }

        let client_manifest = read_json("client manifest", &options.client_manifest).await?;
        if !client_manifest.is_object() {
            return Err(BundlerError::MalformedArtifact {
                what: "client manifest",
                path: options.client_manifest.clone(),
                reason: "expected an object".to_string(),
            });
        }

        let template = read("template", &options.template).await?;
        if !template.contains(OUTLET) {
            return Err(BundlerError::MalformedArtifact {
                what: "template",
                path: options.template.clone(),
                reason: format!("missing {OUTLET}"),
            });
        }

        Ok(Self {
            server_bundle,
            client_manifest,
            template,
        })
    }
}

async fn read(what: &'static str, path: &Path) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BundlerError::MissingArtifact {
            what,
            path: path.to_path_buf(),
        }),
        Err(e) => Err(BundlerError::io(path, e)),
    }
}

async fn read_json(what: &'static str, path: &Path) -> Result<Value> {
    let content = read(what, path).await?;
    serde_json::from_str(&content).map_err(|e| BundlerError::MalformedArtifact {
        what,
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Builds [`ProcessRenderer`]s.
#[derive(Debug, Clone)]
pub struct ProcessRendererFactory {
    command: Vec<String>,
}

impl ProcessRendererFactory {
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(BundlerError::EmptyCommand("renderer"));
        }
        Ok(Self { command })
    }

    pub fn from_derivations(d: &Derivations) -> Result<Self> {
        Self::new(d.get(&RENDERER_COMMAND)?)
    }
}

#[async_trait]
impl RendererFactory for ProcessRendererFactory {
    async fn create(&self, options: &RendererOptions) -> Result<Arc<dyn RenderEngine>> {
        RendererInputs::read(options).await?;
        Ok(Arc::new(ProcessRenderer {
            command: self.command.clone(),
            options: options.clone(),
        }))
    }
}

/// Renders each request with one run of the renderer command.
///
/// The command reads a JSON request on stdin and answers with either
/// `{"html": ...}` or `{"error": {"url", "code", "message", "stack"}}`.
#[derive(Debug, Clone)]
pub struct ProcessRenderer {
    command: Vec<String>,
    options: RendererOptions,
}

#[derive(Serialize)]
struct Request<'a> {
    #[serde(flatten)]
    options: &'a RendererOptions,
    context: &'a RenderContext,
}

#[derive(Debug, Deserialize)]
struct Reply {
    html: Option<String>,
    error: Option<ReplyError>,
}

#[derive(Debug, Deserialize)]
struct ReplyError {
    url: Option<String>,
    code: Option<u16>,
    message: Option<String>,
    stack: Option<String>,
}

impl From<ReplyError> for RenderError {
    fn from(error: ReplyError) -> Self {
        if let Some(url) = error.url {
            return RenderError::Redirect(url);
        }
        if error.code == Some(404) {
            return RenderError::NotFound;
        }
        RenderError::Failed {
            message: error.message.unwrap_or_else(|| "unknown render error".to_string()),
            stack: error.stack,
        }
    }
}

fn failed(message: impl Into<String>, stack: Option<String>) -> RenderError {
    RenderError::Failed {
        message: message.into(),
        stack,
    }
}

#[async_trait]
impl RenderEngine for ProcessRenderer {
    async fn render(&self, context: &RenderContext) -> std::result::Result<String, RenderError> {
        let request = serde_json::to_vec(&Request {
            options: &self.options,
            context,
        })
        .map_err(|e| failed(e.to_string(), None))?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| failed("renderer command is empty", None))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.options.basedir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failed(format!("failed to run renderer: {e}"), None))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&request)
                .await
                .map_err(|e| failed(format!("failed to write render request: {e}"), None))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| failed(format!("renderer did not finish: {e}"), None))?;

        // A failing exit status with a readable reply is still a reply.
        let reply: Reply = serde_json::from_slice(&output.stdout).map_err(|e| {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            failed(
                format!("unreadable renderer reply ({}): {e}", output.status),
                (!stderr.is_empty()).then_some(stderr),
            )
        })?;

        match reply {
            Reply {
                error: Some(error), ..
            } => Err(error.into()),
            Reply { html: Some(html), .. } => Ok(html),
            Reply { .. } => Err(failed("renderer returned no html", None)),
        }
    }
}

/// Loads a fresh render engine after each successful compile.
pub struct RendererLoader {
    factory: Arc<dyn RendererFactory>,
    options: RendererOptions,
}

impl RendererLoader {
    pub fn new(factory: Arc<dyn RendererFactory>, options: RendererOptions) -> Self {
        Self { factory, options }
    }
}

#[async_trait]
impl ArtifactLoader for RendererLoader {
    type Artifact = Arc<dyn RenderEngine>;

    async fn load(&self, _stats: &CompileStats) -> Result<Self::Artifact> {
        let engine = self.factory.create(&self.options).await?;
        tracing::debug!(bundle = %self.options.server_bundle.display(), "render engine ready");
        Ok(engine)
    }
}
