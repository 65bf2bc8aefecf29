//! Raw state loader: manifest, environment, flags and filesystem probes.

use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::environment::{Environment, PRODUCTION};
use crate::error::{ConfigError, Result};
use crate::manifest::{PackageJson, find_package_json};
use crate::options::Options;
use crate::state::{
    DEFAULT_OPTIONAL_DEPENDENCIES, Entries, Extensions, MinifyOptions, Mode, RenderTarget, State,
};

/// Environment variable overriding the tool home directory.
pub const HOME_VAR: &str = "SKEIN_HOME";

/// Postcss config files probed in the project root, in order.
pub const POSTCSS_CONFIG_FILES: [&str; 5] = [
    "postcss.config.js",
    ".postcssrc.js",
    ".postcssrc.json",
    ".postcssrc.yaml",
    ".postcssrc",
];

const DEV_DEVTOOL: &str = "cheap-module-eval-source-map";
const PROD_DEVTOOL: &str = "nosources-source-map";

/// Builds the [`State`] snapshot for one CLI invocation.
#[derive(Debug, Clone)]
pub struct Loader {
    cwd: PathBuf,
    home: PathBuf,
    environment: Environment,
}

impl Loader {
    pub fn new(cwd: impl Into<PathBuf>, home: impl Into<PathBuf>, environment: Environment) -> Self {
        Self {
            cwd: cwd.into(),
            home: home.into(),
            environment,
        }
    }

    /// Loader for the running process: current directory, `SKEIN_HOME` or
    /// the installation directory, and the `NODE_` environment.
    pub fn from_process() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::io(".", e))?;
        Ok(Self::new(cwd, default_home()?, Environment::from_env()?))
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Discover the project and produce the immutable state.
    pub async fn load(&self, options: &Options) -> Result<State> {
        let start = match &options.context {
            Some(dir) => absolutize(&self.cwd, dir),
            None => self.cwd.clone(),
        };

        let manifest_path = find_package_json(&start)
            .await
            .ok_or_else(|| ConfigError::ManifestNotFound(start.clone()))?;
        let mut package_json = PackageJson::read(&manifest_path).await?;
        for warning in package_json.normalize() {
            tracing::debug!(path = %manifest_path.display(), "package.json: {warning}");
        }

        let project_dir = manifest_path.parent().unwrap_or(&start);
        let context = canonicalize(project_dir).await?;
        let home = tokio::fs::canonicalize(&self.home)
            .await
            .map_err(|_| ConfigError::HomeNotFound(self.home.clone()))?;

        let module_paths = discover_module_paths(&context, &home).await?;
        let postcss_config = postcss_config(&package_json, &context, &home).await;

        let index_template = match &options.index_template {
            Some(template) => absolutize(&context, template),
            None => {
                file_or_fallback(
                    &[context.join("index.mustache")],
                    home.join("index.mustache"),
                )
                .await
            }
        };

        let node_env = match options.mode {
            Mode::Build if !self.environment.is_production() => {
                tracing::warn!(
                    node_env = %self.environment.env,
                    "build always produces a production bundle; ignoring NODE_ENV"
                );
                PRODUCTION.to_string()
            }
            _ => self.environment.env.clone(),
        };
        let development = node_env == crate::environment::DEVELOPMENT;

        let entries = Entries {
            client: options
                .entry_client
                .as_ref()
                .map(|p| absolutize(&context, p))
                .unwrap_or_else(|| context.join("src/entry-client.ts")),
            server: options
                .entry_server
                .as_ref()
                .map(|p| absolutize(&context, p))
                .unwrap_or_else(|| context.join("src/entry-server.ts")),
            polyfill: home.join("entries/polyfill.ts"),
            hot_middleware: home.join("entries/hot-middleware.ts"),
        };

        let static_assets = match options.static_assets_override() {
            Some(value) => value,
            None => Some("static".to_string()),
        };

        let optional_dependencies = package_json
            .skein
            .optional_dependencies
            .clone()
            .unwrap_or_else(|| {
                DEFAULT_OPTIONAL_DEPENDENCIES
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let bundler_command = package_json.skein.bundler.clone().unwrap_or_else(|| {
            node_command(&home, "lib/compile.js")
        });
        let renderer_command = package_json.skein.renderer.clone().unwrap_or_else(|| {
            node_command(&home, "lib/render.js")
        });

        Ok(State {
            mode: options.mode,
            host: self.environment.host.clone(),
            port: self.environment.port,
            output_path: options
                .output_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("build")),
            output_public_path: options
                .output_public_path
                .clone()
                .unwrap_or_else(|| "/".to_string()),
            index_template,
            static_assets,
            devtool: options.devtool.clone().unwrap_or_else(|| {
                let devtool = if development { DEV_DEVTOOL } else { PROD_DEVTOOL };
                devtool.to_string()
            }),
            watch: options.watch.unwrap_or(development),
            interactive: options.interactive,
            log_level: options.log_level,
            entries,
            ssr_client_filename: ".ssr/ssr-client-manifest.json".to_string(),
            ssr_server_filename: ".ssr/ssr-server-bundle.json".to_string(),
            extensions: Extensions::default(),
            minify_options: MinifyOptions::default(),
            module_paths,
            package_json,
            version: env!("CARGO_PKG_VERSION").to_string(),
            assets_directory: "assets".to_string(),
            render_target: RenderTarget::Client,
            postcss_config,
            optional_dependencies,
            bundler_command,
            renderer_command,
            node_env,
            context,
            home,
        })
    }
}

/// `SKEIN_HOME`, else the directory above the one holding the executable.
pub fn default_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    let exe = std::env::current_exe().map_err(|e| ConfigError::io("current executable", e))?;
    let bin_dir = exe.parent().unwrap_or(Path::new("."));
    Ok(bin_dir.parent().unwrap_or(bin_dir).to_path_buf())
}

/// `node_modules` under the package root of `context` and of `home`,
/// deduplicated and limited to existing directories.
pub async fn discover_module_paths(context: &Path, home: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for dir in [context, home] {
        let candidate = package_root(dir).await.join("node_modules");
        if paths.contains(&candidate) {
            continue;
        }
        if is_dir(&candidate).await {
            paths.push(candidate);
        }
    }

    if paths.is_empty() {
        return Err(ConfigError::ModulePathDiscovery {
            context: context.to_path_buf(),
            home: home.to_path_buf(),
        });
    }
    Ok(paths)
}

/// Where postcss should look for its configuration.
///
/// An inline `postcss` manifest field wins, then the first config file in
/// the project root, then the tool's own `postcss.config.js`.
pub async fn postcss_config(package_json: &PackageJson, context: &Path, home: &Path) -> PathBuf {
    if package_json.postcss.is_some() {
        return context.to_path_buf();
    }

    let candidates: Vec<PathBuf> = POSTCSS_CONFIG_FILES
        .iter()
        .map(|name| context.join(name))
        .collect();
    file_or_fallback(&candidates, home.join("postcss.config.js")).await
}

/// The first existing candidate, else the fallback.
pub async fn file_or_fallback(candidates: &[PathBuf], fallback: PathBuf) -> PathBuf {
    for candidate in candidates {
        if tokio::fs::metadata(candidate).await.is_ok() {
            return candidate.clone();
        }
    }
    fallback
}

/// Nearest ancestor (inclusive) that looks like an npm package root.
async fn package_root(dir: &Path) -> PathBuf {
    let mut current = Some(dir);
    while let Some(candidate) = current {
        if candidate.file_name().is_some_and(|name| name == "node_modules") {
            current = candidate.parent();
            continue;
        }
        if tokio::fs::metadata(candidate.join("package.json")).await.is_ok()
            || is_dir(&candidate.join("node_modules")).await
        {
            return candidate.to_path_buf();
        }
        current = candidate.parent();
    }
    dir.to_path_buf()
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_dir())
}

async fn canonicalize(path: &Path) -> Result<PathBuf> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| ConfigError::io(path, e))
}

fn absolutize(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf().clean()
    } else {
        base.join(path).clean()
    }
}

fn node_command(home: &Path, script: &str) -> Vec<String> {
    vec![
        "node".to_string(),
        home.join(script).display().to_string(),
    ]
}
