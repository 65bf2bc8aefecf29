//! Error types for state loading and configuration derivation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Errors raised while building the [`State`](crate::State) snapshot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no package.json found in {} or any parent directory", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("invalid package.json at {}: {source}", path.display())]
    InvalidManifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("module path discovery failed: no node_modules directory for {} or {}", context.display(), home.display())]
    ModulePathDiscovery { context: PathBuf, home: PathBuf },

    #[error("tool home directory not found: {}", .0.display())]
    HomeNotFound(PathBuf),

    #[error("invalid environment: {0}")]
    Environment(String),

    #[error("invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by derivation graph nodes.
///
/// A node that cannot produce a value fails the whole derivation; no partial
/// configuration is ever handed to the assembler.
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("failed to resolve '{module}' (searched: {searched})")]
    Unresolved { module: String, searched: String },

    #[error("node '{node}' read '{dependency}' without declaring it")]
    UndeclaredDependency {
        node: &'static str,
        dependency: &'static str,
    },

    #[error("node '{0}' has declared inputs and cannot read the state directly")]
    StateAccess(&'static str),

    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("node '{0}' is registered with a different value type")]
    TypeMismatch(&'static str),

    #[error("dependency cycle through '{0}'")]
    Cycle(String),

    #[error("invalid pattern in '{node}': {source}")]
    Pattern {
        node: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("failed to fingerprint '{node}': {source}")]
    Fingerprint {
        node: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
