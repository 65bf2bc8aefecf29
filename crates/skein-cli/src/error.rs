//! Error handling for the skein CLI.
//!
//! Library errors from the loader, the derivation graph and the bundler
//! convert into [`CliError`] through `#[from]`; `main` turns the final error
//! into a miette report with an actionable hint.

mod miette;

pub use self::miette::cli_error_to_miette;

use std::path::PathBuf;

use skein_bundler::{BundlerError, DriverFailure};
use skein_config::{ConfigError, DeriveError};
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Manifest, environment or tool home could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A derived configuration value could not be computed
    #[error("Configuration error: {0}")]
    Derive(#[from] DeriveError),

    /// Assembly, bundler process or renderer failures
    #[error("Bundler error: {0}")]
    Bundler(#[from] BundlerError),

    /// The first build did not produce servable output
    #[error("Build failed: {0}")]
    Build(#[from] DriverFailure),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP listener errors
    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_convert() {
        let err: CliError = ConfigError::ManifestNotFound(PathBuf::from("/tmp/app")).into();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("/tmp/app"));
    }

    #[test]
    fn driver_failures_convert() {
        let err: CliError = DriverFailure::Compile {
            errors: vec!["a".into(), "b".into()],
        }
        .into();
        assert!(matches!(err, CliError::Build(_)));
        assert!(err.to_string().contains("2 error(s)"));
    }
}
