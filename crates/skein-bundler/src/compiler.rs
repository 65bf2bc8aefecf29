//! The bundler seam.
//!
//! The module graph, loaders and code generation belong to an external
//! bundler. [`ProcessBundler`] hands it the assembled configurations as JSON
//! and reads compile statistics back from its stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skein_config::Derivations;
use skein_config::graph::selectors::{BUNDLER_COMMAND, CACHE_ROOT, CONTEXT};
use tokio::process::Command;

use crate::config::BundlerConfig;
use crate::error::{BundlerError, Result};

/// File the configurations are written to before each compile.
pub const CONFIG_FILE: &str = "bundler-config.json";

/// Outcome of one compile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileStats {
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Emitted asset names, relative to the output path.
    #[serde(default)]
    pub assets: Vec<String>,
}

impl CompileStats {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Runs one compile over a set of configurations.
///
/// `Err` is reserved for the bundler itself failing (it could not start,
/// crashed, or spoke nonsense). Errors in the compiled project are reported
/// through [`CompileStats::errors`].
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn compile(&self, configs: &[BundlerConfig]) -> Result<CompileStats>;
}

/// Bundler driven as a child process.
///
/// The command receives the path of the configuration file as its last
/// argument and prints [`CompileStats`] as JSON on stdout.
#[derive(Debug, Clone)]
pub struct ProcessBundler {
    command: Vec<String>,
    context: PathBuf,
    scratch: PathBuf,
}

impl ProcessBundler {
    pub fn new(command: Vec<String>, context: PathBuf, scratch: PathBuf) -> Result<Self> {
        if command.is_empty() {
            return Err(BundlerError::EmptyCommand("bundler"));
        }
        Ok(Self {
            command,
            context,
            scratch,
        })
    }

    pub fn from_derivations(d: &Derivations) -> Result<Self> {
        Self::new(d.get(&BUNDLER_COMMAND)?, d.get(&CONTEXT)?, d.get(&CACHE_ROOT)?)
    }

    pub fn config_path(&self) -> PathBuf {
        self.scratch.join(CONFIG_FILE)
    }

    fn display(&self) -> String {
        self.command.join(" ")
    }

    async fn write_configs(&self, configs: &[BundlerConfig]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.scratch)
            .await
            .map_err(|e| BundlerError::io(&self.scratch, e))?;

        let path = self.config_path();
        let content = serde_json::to_vec_pretty(configs).map_err(BundlerError::Merge)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| BundlerError::io(&path, e))?;
        Ok(path)
    }
}

#[async_trait]
impl Bundler for ProcessBundler {
    async fn compile(&self, configs: &[BundlerConfig]) -> Result<CompileStats> {
        let config_path = self.write_configs(configs).await?;
        let output = run(&self.command, &self.context, &config_path).await?;

        let stats = serde_json::from_slice::<CompileStats>(&output.stdout);
        match (output.status.success(), stats) {
            (true, Ok(stats)) => Ok(stats),
            (false, Ok(stats)) if stats.has_errors() => Ok(stats),
            (true, Err(source)) => Err(BundlerError::Protocol {
                command: self.display(),
                source,
            }),
            (false, _) => Err(BundlerError::Crashed {
                command: self.display(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }
}

async fn run(command: &[String], cwd: &Path, config: &Path) -> Result<std::process::Output> {
    let (program, args) = command
        .split_first()
        .ok_or(BundlerError::EmptyCommand("bundler"))?;

    tracing::debug!(command = %command.join(" "), config = %config.display(), "starting bundler");

    Command::new(program)
        .args(args)
        .arg(config)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| BundlerError::Spawn {
            command: command.join(" "),
            source,
        })
}
