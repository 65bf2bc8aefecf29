//! Miette report conversion for CLI errors.

use ::miette::Report;
use skein_bundler::{BundlerError, DriverFailure};
use skein_config::{ConfigError, DeriveError};

use crate::error::CliError;

/// Convert a [`CliError`] into a report, attaching a hint where one helps.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Config(e) => config_error_to_miette(e),
        CliError::Derive(e) => derive_error_to_miette(e),
        CliError::Bundler(e) => bundler_error_to_miette(e),
        CliError::Build(DriverFailure::Compile { errors }) => ::miette::miette!(
            help = "Fix the errors above and run the command again",
            "Build failed with {} error(s):\n\n{}",
            errors.len(),
            errors.join("\n\n")
        ),
        CliError::Server(msg) => ::miette::miette!(
            help = "Set NODE_PORT or NODE_HOST to listen somewhere else",
            "Server error: {msg}"
        ),
        other => ::miette::miette!("{other}"),
    }
}

fn config_error_to_miette(err: ConfigError) -> Report {
    match err {
        ConfigError::ManifestNotFound(start) => ::miette::miette!(
            help = "Run skein inside a project, or point --context at one",
            "No package.json found in {} or any parent directory",
            start.display()
        ),
        ConfigError::HomeNotFound(home) => ::miette::miette!(
            help = "Set SKEIN_HOME to the skein installation directory",
            "Tool home directory not found: {}",
            home.display()
        ),
        ConfigError::ModulePathDiscovery { context, .. } => ::miette::miette!(
            help = "Install the project's dependencies (npm install)",
            "No node_modules directory found for {}",
            context.display()
        ),
        ConfigError::Environment(msg) => ::miette::miette!(
            help = "NODE_PORT must be an integer between 0 and 65535",
            "Invalid environment: {msg}"
        ),
        other => ::miette::miette!("Configuration error: {other}"),
    }
}

fn derive_error_to_miette(err: DeriveError) -> Report {
    match err {
        DeriveError::Unresolved { module, searched } => ::miette::miette!(
            help = format!("Install it with `npm install --save-dev {module}`"),
            "Cannot find module '{module}'\n\nSearched: {searched}"
        ),
        other => ::miette::miette!("Configuration error: {other}"),
    }
}

fn bundler_error_to_miette(err: BundlerError) -> Report {
    match err {
        BundlerError::Derive(e) => derive_error_to_miette(e),
        BundlerError::EmptyCommand(what) => ::miette::miette!(
            help = format!("Set \"skein\": {{ \"{what}\": [...] }} in package.json"),
            "The {what} command is empty"
        ),
        BundlerError::Spawn { command, source } => ::miette::miette!(
            help = "Make sure node is installed and on PATH",
            "Failed to run '{command}': {source}"
        ),
        BundlerError::MissingArtifact { what, path } => ::miette::miette!(
            help = "Run `skein build` first",
            "Missing {what} at {}",
            path.display()
        ),
        other => ::miette::miette!("Bundler error: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn manifest_not_found_has_a_hint() {
        let report = cli_error_to_miette(ConfigError::ManifestNotFound(PathBuf::from("/srv")).into());
        let help = report.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("--context"));
        assert!(report.to_string().contains("/srv"));
    }

    #[test]
    fn compile_errors_are_listed() {
        let report = cli_error_to_miette(
            DriverFailure::Compile {
                errors: vec!["Module not found: ./a".into(), "Unexpected token".into()],
            }
            .into(),
        );
        let message = report.to_string();
        assert!(message.contains("2 error(s)"));
        assert!(message.contains("Module not found: ./a"));
        assert!(message.contains("Unexpected token"));
    }

    #[test]
    fn unresolved_module_suggests_install() {
        let report = cli_error_to_miette(
            DeriveError::Unresolved {
                module: "typescript".into(),
                searched: "/app/node_modules".into(),
            }
            .into(),
        );
        let help = report.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("npm install --save-dev typescript"));
    }
}
