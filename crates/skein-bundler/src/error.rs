//! Error types for assembly, compilation and rendering.

use std::path::PathBuf;

use skein_config::DeriveError;
use thiserror::Error;

pub type Result<T, E = BundlerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BundlerError {
    #[error(transparent)]
    Derive(#[from] DeriveError),

    #[error("failed to merge configuration: {0}")]
    Merge(#[source] serde_json::Error),

    #[error("{0} command is empty")]
    EmptyCommand(&'static str),

    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    Crashed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("'{command}' produced unreadable output: {source}")]
    Protocol {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing {what} at {}", path.display())]
    MissingArtifact { what: &'static str, path: PathBuf },

    #[error("malformed {what} at {}: {reason}", path.display())]
    MalformedArtifact {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BundlerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
