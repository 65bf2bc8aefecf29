//! Incremental build cache directory.
//!
//! Each configuration hash gets its own bucket under
//! `<context>/node_modules/.cache/skein/<hash>` holding the bundler's
//! `records.json` and an `environment.json` stamp. The stamp records a
//! BLAKE3 digest over the tracked project files and directories (path, size
//! and modification time); when it no longer matches, the bucket is wiped
//! before the next build.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use skein_config::Derivations;
use skein_config::graph::selectors::{
    CACHE_DIRECTORY, COND_DEBUG, COND_WATCH, CONFIG_HASH, CONTEXT, STATIC_ASSETS,
};
use walkdir::WalkDir;

use crate::config::{BundlerConfig, Plugin};
use crate::error::{BundlerError, Result};

/// Plugin name carrying [`BuildCacheOptions`].
pub const PLUGIN: &str = "build-cache";

/// Project files whose changes invalidate the cache.
pub const TRACKED_FILES: [&str; 9] = [
    ".postcssrc",
    ".postcssrc.js",
    ".postcssrc.json",
    ".postcssrc.yaml",
    "package-lock.json",
    "package.json",
    "postcss.config.js",
    "tsconfig.json",
    "yarn.lock",
];

const RECORDS_FILE: &str = "records.json";
const ENVIRONMENT_FILE: &str = "environment.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCacheOptions {
    pub cache_directory: PathBuf,
    pub records_path: PathBuf,
    pub config_hash: String,
    pub environment_hash: EnvironmentSpec,
}

/// What the environment digest covers, relative to `root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub root: PathBuf,
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

impl BuildCacheOptions {
    /// Cache options for this state; `None` unless watching without debug
    /// logging.
    pub fn from_derivations(d: &Derivations) -> Result<Option<Self>> {
        if !d.get(&COND_WATCH)? || d.get(&COND_DEBUG)? {
            return Ok(None);
        }

        let cache_directory = d.get(&CACHE_DIRECTORY)?;
        let mut directories = vec!["src".to_string()];
        directories.extend(d.get(&STATIC_ASSETS)?);

        Ok(Some(Self {
            records_path: cache_directory.join(RECORDS_FILE),
            cache_directory,
            config_hash: d.get(&CONFIG_HASH)?,
            environment_hash: EnvironmentSpec {
                root: d.get(&CONTEXT)?,
                directories,
                files: TRACKED_FILES.iter().map(|f| f.to_string()).collect(),
            },
        }))
    }

    pub fn plugin(&self) -> Result<Plugin> {
        let options = serde_json::to_value(self).map_err(BundlerError::Merge)?;
        Ok(Plugin::new(PLUGIN, options))
    }

    /// Options carried by a configuration's cache plugin, if any.
    pub fn from_config(config: &BundlerConfig) -> Option<Self> {
        config
            .plugin(PLUGIN)
            .and_then(|plugin| serde_json::from_value(plugin.options.clone()).ok())
    }
}

impl EnvironmentSpec {
    /// Digest of tracked files and every file under tracked directories.
    ///
    /// Missing entries hash as absent so creating one changes the digest.
    pub fn digest(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(self.root.to_string_lossy().as_bytes());

        let mut files = self.files.clone();
        files.sort();
        for file in &files {
            hash_entry(&mut hasher, file, &self.root.join(file));
        }

        let mut directories = self.directories.clone();
        directories.sort();
        for directory in &directories {
            let dir = self.root.join(directory);
            hasher.update(b"dir:");
            hasher.update(directory.as_bytes());
            for entry in WalkDir::new(&dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let relative = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .into_owned();
                hash_entry(&mut hasher, &relative, entry.path());
            }
        }

        hasher.finalize().to_hex().to_string()
    }
}

fn hash_entry(hasher: &mut Hasher, name: &str, path: &Path) {
    hasher.update(name.as_bytes());
    match std::fs::metadata(path) {
        Ok(meta) => {
            hasher.update(&meta.len().to_le_bytes());
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            hasher.update(&modified.to_le_bytes());
        }
        Err(_) => {
            hasher.update(b"<absent>");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Stamp {
    hash: String,
    #[serde(flatten)]
    spec: EnvironmentSpec,
}

/// Outcome of preparing a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Created,
    Reused,
    Invalidated,
}

/// Bring the bucket in line with the current environment.
pub async fn prepare(options: &BuildCacheOptions) -> Result<CacheStatus> {
    let spec = options.environment_hash.clone();
    let hash = tokio::task::spawn_blocking(move || spec.digest())
        .await
        .map_err(|e| BundlerError::io(&options.cache_directory, std::io::Error::other(e)))?;

    let dir = &options.cache_directory;
    let stamp_path = dir.join(ENVIRONMENT_FILE);

    let previous: Option<Stamp> = match tokio::fs::read_to_string(&stamp_path).await {
        Ok(content) => serde_json::from_str(&content).ok(),
        Err(_) => None,
    };

    let status = match previous {
        Some(stamp) if stamp.hash == hash => CacheStatus::Reused,
        Some(_) => {
            tracing::info!(path = %dir.display(), "build environment changed, clearing cache");
            tokio::fs::remove_dir_all(dir)
                .await
                .map_err(|e| BundlerError::io(dir, e))?;
            CacheStatus::Invalidated
        }
        None => CacheStatus::Created,
    };

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BundlerError::io(dir, e))?;

    if tokio::fs::metadata(&options.records_path).await.is_err() {
        tokio::fs::write(&options.records_path, "{}")
            .await
            .map_err(|e| BundlerError::io(&options.records_path, e))?;
    }

    let stamp = Stamp {
        hash,
        spec: options.environment_hash.clone(),
    };
    let content = serde_json::to_string_pretty(&stamp).map_err(BundlerError::Merge)?;
    tokio::fs::write(&stamp_path, content)
        .await
        .map_err(|e| BundlerError::io(&stamp_path, e))?;

    tracing::debug!(path = %dir.display(), ?status, "build cache ready");
    Ok(status)
}

/// Prepare the cache bucket of every configuration that carries one.
pub async fn prepare_all<'a>(configs: impl IntoIterator<Item = &'a BundlerConfig>) -> Result<()> {
    for config in configs {
        if let Some(options) = BuildCacheOptions::from_config(config) {
            prepare(&options).await?;
        }
    }
    Ok(())
}
