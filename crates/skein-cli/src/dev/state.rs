//! Shared state for the development server.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use skein_bundler::{ArtifactLoader, BundlerError, CompileStats, DriverEvent, Register, Snapshot};
use tokio::sync::mpsc;

/// In-memory copy of one compile's output.
///
/// Keys are URL paths under the public path, e.g. `/assets/js/main.js`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleCache {
    files: HashMap<String, (Vec<u8>, String)>,
}

impl BundleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: String, content: Vec<u8>, content_type: String) {
        self.files.insert(path, (content, content_type));
    }

    /// Content and content type served at `path`.
    pub fn get(&self, path: &str) -> Option<&(Vec<u8>, String)> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Read every file under `dir`, keyed by `public_path` plus the relative
    /// path.
    pub async fn load(dir: &Path, public_path: &str) -> Result<Self, BundlerError> {
        if tokio::fs::metadata(dir).await.is_err() {
            return Err(BundlerError::MissingArtifact {
                what: "development bundle",
                path: dir.to_path_buf(),
            });
        }

        let prefix = normalize_public_path(public_path);
        let mut cache = BundleCache::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current)
                .await
                .map_err(|source| io_error(&current, source))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|source| io_error(&current, source))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|source| io_error(&path, source))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(dir) else {
                    continue;
                };
                let key = format!("{prefix}{}", url_path(relative));
                let content = tokio::fs::read(&path)
                    .await
                    .map_err(|source| io_error(&path, source))?;
                cache.insert(key.clone(), content, content_type(&key).to_string());
            }
        }

        tracing::debug!(files = cache.len(), dir = %dir.display(), "loaded development bundle");
        Ok(cache)
    }

    /// Read only the named assets (paths relative to `dir`). Leftovers from
    /// earlier compiles stay on disk but are never served.
    pub async fn load_assets(
        dir: &Path,
        public_path: &str,
        assets: &[String],
    ) -> Result<Self, BundlerError> {
        let prefix = normalize_public_path(public_path);
        let mut cache = BundleCache::new();

        for asset in assets {
            let relative = Path::new(asset);
            if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
                tracing::warn!(asset, "skipping emitted asset outside the output directory");
                continue;
            }

            let path = dir.join(relative);
            let content = match tokio::fs::read(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(BundlerError::MissingArtifact {
                        what: "emitted asset",
                        path,
                    });
                }
                Err(source) => return Err(io_error(&path, source)),
            };
            let key = format!("{prefix}{}", url_path(relative));
            cache.insert(key.clone(), content, content_type(&key).to_string());
        }

        tracing::debug!(files = cache.len(), dir = %dir.display(), "loaded emitted assets");
        Ok(cache)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> BundlerError {
    BundlerError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `/`-terminated, `/`-rooted form of a public path.
fn normalize_public_path(public_path: &str) -> String {
    let trimmed = public_path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

fn url_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Content type from a path's extension.
pub fn content_type(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Reads the development output after each compile: the assets the compile
/// reports, or the whole directory when it reports none.
#[derive(Debug, Clone)]
pub struct DevBundleLoader {
    output_path: PathBuf,
    public_path: String,
}

impl DevBundleLoader {
    pub fn new(output_path: PathBuf, public_path: impl Into<String>) -> Self {
        Self {
            output_path,
            public_path: public_path.into(),
        }
    }

    /// Remove output left behind by earlier sessions.
    pub async fn clean(&self) -> Result<(), BundlerError> {
        match tokio::fs::remove_dir_all(&self.output_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(&self.output_path, source)),
        }
    }
}

#[async_trait]
impl ArtifactLoader for DevBundleLoader {
    type Artifact = Arc<BundleCache>;

    async fn load(&self, stats: &CompileStats) -> skein_bundler::Result<Self::Artifact> {
        let cache = if stats.assets.is_empty() {
            BundleCache::load(&self.output_path, &self.public_path).await?
        } else {
            BundleCache::load_assets(&self.output_path, &self.public_path, &stats.assets).await?
        };
        Ok(Arc::new(cache))
    }
}

/// Connected SSE clients by id.
pub type ClientRegistry = Arc<RwLock<HashMap<usize, mpsc::Sender<String>>>>;

/// State shared by the dev server's handlers.
pub struct DevServerState {
    register: Arc<Register<Arc<BundleCache>>>,
    pub clients: ClientRegistry,
    next_client_id: RwLock<usize>,
}

pub type SharedState = Arc<DevServerState>;

impl DevServerState {
    pub fn new(register: Arc<Register<Arc<BundleCache>>>) -> Self {
        Self {
            register,
            clients: Arc::new(RwLock::new(HashMap::new())),
            next_client_id: RwLock::new(0),
        }
    }

    /// The latest compile outcome.
    pub fn snapshot(&self) -> Arc<Snapshot<Arc<BundleCache>>> {
        self.register.snapshot()
    }

    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = {
            let mut next_id = self.next_client_id.write();
            let id = *next_id;
            *next_id += 1;
            id
        };

        let (tx, rx) = mpsc::channel(100);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Send a driver event to every client, dropping the ones that left.
    pub async fn broadcast(&self, event: &DriverEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("failed to encode reload event: {e}");
                return;
            }
        };

        let clients = self.clients.read().clone();
        let mut failed_ids = Vec::new();
        for (id, tx) in clients {
            if tx.send(json.clone()).await.is_err() {
                failed_ids.push(id);
            }
        }
        for id in failed_ids {
            self.unregister_client(id);
        }
    }
}
