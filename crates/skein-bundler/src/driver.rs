//! Build driver.
//!
//! Runs compile cycles on a background task and moves through
//! `Idle -> Compiling -> {Ready, Failed}`. Leaving `Ready` or `Failed` for
//! another compile only happens in watch mode; a failure outside watch mode
//! is terminal.
//!
//! After each successful compile an [`ArtifactLoader`] turns the output into
//! something servable (a render engine, an in-memory file set). The driver is
//! the only writer of the [`Register`] holding that artifact and the last
//! error; readers always see both halves from the same cycle.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::cache;
use crate::compiler::{Bundler, CompileStats};
use crate::config::BundlerConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Compiling,
    Ready,
    Failed,
}

/// Why a cycle did not produce an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverFailure {
    #[error("compilation failed with {} error(s)", errors.len())]
    Compile { errors: Vec<String> },

    #[error("bundler failed: {0}")]
    Bundler(String),

    #[error("could not load build output: {0}")]
    Artifact(String),

    #[error("build stopped before completing")]
    Stopped,
}

/// Artifact and last error as of one completed cycle.
#[derive(Debug, Clone)]
pub struct Snapshot<A> {
    pub artifact: Option<A>,
    pub error: Option<DriverFailure>,
    /// The error ended the session; no further cycles will run.
    pub terminal: bool,
}

impl<A> Default for Snapshot<A> {
    fn default() -> Self {
        Self {
            artifact: None,
            error: None,
            terminal: false,
        }
    }
}

/// Single-writer register replaced whole on every cycle.
#[derive(Debug)]
pub struct Register<A> {
    current: RwLock<Arc<Snapshot<A>>>,
}

impl<A> Register<A> {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot<A>> {
        Arc::clone(&self.current.read())
    }

    fn replace(&self, snapshot: Snapshot<A>) {
        *self.current.write() = Arc::new(snapshot);
    }
}

impl<A> Default for Register<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns compiled output into a servable artifact.
///
/// `stats` is the successful compile the artifact is loaded for.
#[async_trait]
pub trait ArtifactLoader: Send + Sync {
    type Artifact: Clone + Send + Sync + 'static;

    async fn load(&self, stats: &CompileStats) -> Result<Self::Artifact>;
}

/// Lifecycle notifications, for the UI and hot reload clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DriverEvent {
    CompileStarted,
    Compiled {
        duration_ms: u64,
        warnings: Vec<String>,
    },
    CompileFailed {
        message: String,
        #[serde(default)]
        errors: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverOptions {
    pub watch: bool,
    /// Leave error and warning output to the interactive UI.
    pub interactive: bool,
}

/// Resolves once, after the first servable artifact or the first terminal
/// failure.
#[derive(Debug)]
pub struct Readiness {
    rx: oneshot::Receiver<std::result::Result<(), DriverFailure>>,
}

impl Readiness {
    pub async fn wait(self) -> std::result::Result<(), DriverFailure> {
        self.rx.await.unwrap_or(Err(DriverFailure::Stopped))
    }
}

/// Handle to a running driver.
pub struct DriverHandle<A> {
    register: Arc<Register<A>>,
    phase: watch::Receiver<Phase>,
    events: broadcast::Sender<DriverEvent>,
    trigger: mpsc::Sender<()>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl<A> DriverHandle<A> {
    pub fn register(&self) -> Arc<Register<A>> {
        Arc::clone(&self.register)
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DriverEvent> {
        self.events.subscribe()
    }

    /// Sender for recompile requests. Requests arriving while a cycle runs
    /// collapse into one follow-up cycle.
    pub fn trigger(&self) -> mpsc::Sender<()> {
        self.trigger.clone()
    }

    /// Stop the driver, cancelling an in-flight compile, and wait for it.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("build driver task ended abnormally: {e}");
        }
    }

    /// Wait until the driver finishes on its own (single-shot sessions).
    pub async fn finished(mut self) {
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("build driver task ended abnormally: {e}");
        }
    }
}

pub struct Driver<L: ArtifactLoader> {
    bundler: Arc<dyn Bundler>,
    loader: L,
    configs: Vec<BundlerConfig>,
    options: DriverOptions,
    register: Arc<Register<L::Artifact>>,
    phase: watch::Sender<Phase>,
    events: broadcast::Sender<DriverEvent>,
}

enum Cycle {
    Continue,
    Terminal,
}

impl<L: ArtifactLoader + 'static> Driver<L> {
    /// Start compiling `configs` on a background task.
    pub fn spawn(
        bundler: Arc<dyn Bundler>,
        loader: L,
        configs: Vec<BundlerConfig>,
        options: DriverOptions,
    ) -> (DriverHandle<L::Artifact>, Readiness) {
        let register = Arc::new(Register::new());
        let (phase, phase_rx) = watch::channel(Phase::Idle);
        let (events, _) = broadcast::channel(64);
        let (trigger, triggers) = mpsc::channel(16);
        let (shutdown, shutdown_rx) = oneshot::channel();
        let (ready, ready_rx) = oneshot::channel();

        let driver = Driver {
            bundler,
            loader,
            configs,
            options,
            register: Arc::clone(&register),
            phase,
            events: events.clone(),
        };
        let task = tokio::spawn(driver.run(triggers, shutdown_rx, ready));

        let handle = DriverHandle {
            register,
            phase: phase_rx,
            events,
            trigger,
            shutdown: Some(shutdown),
            task,
        };
        (handle, Readiness { rx: ready_rx })
    }

    async fn run(
        self,
        mut triggers: mpsc::Receiver<()>,
        mut shutdown: oneshot::Receiver<()>,
        ready: oneshot::Sender<std::result::Result<(), DriverFailure>>,
    ) {
        let mut ready = Some(ready);

        if let Err(e) = cache::prepare_all(&self.configs).await {
            tracing::warn!("build cache unavailable: {e}");
        }

        loop {
            let cycle = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                cycle = self.cycle(&mut ready) => cycle,
            };

            if matches!(cycle, Cycle::Terminal) || !self.options.watch {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                request = triggers.recv() => {
                    if request.is_none() {
                        break;
                    }
                    while triggers.try_recv().is_ok() {}
                }
            }
        }

        tracing::debug!("build driver finished");
    }

    async fn cycle(
        &self,
        ready: &mut Option<oneshot::Sender<std::result::Result<(), DriverFailure>>>,
    ) -> Cycle {
        self.phase.send_replace(Phase::Compiling);
        let _ = self.events.send(DriverEvent::CompileStarted);
        let started = Instant::now();

        let outcome = match self.bundler.compile(&self.configs).await {
            Ok(stats) => self.complete(stats).await,
            Err(e) => Err(DriverFailure::Bundler(e.to_string())),
        };

        match outcome {
            Ok((artifact, warnings)) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.register.replace(Snapshot {
                    artifact: Some(artifact),
                    error: None,
                    terminal: false,
                });
                self.phase.send_replace(Phase::Ready);
                tracing::info!(duration_ms, warnings = warnings.len(), "compiled");
                let _ = self.events.send(DriverEvent::Compiled {
                    duration_ms,
                    warnings,
                });
                if let Some(ready) = ready.take() {
                    let _ = ready.send(Ok(()));
                }
                Cycle::Continue
            }
            Err(failure) => {
                let terminal = !self.options.watch;
                let previous = self.register.snapshot();
                self.register.replace(Snapshot {
                    artifact: previous.artifact.clone(),
                    error: Some(failure.clone()),
                    terminal,
                });
                self.phase.send_replace(Phase::Failed);
                tracing::error!(terminal, "{failure}");
                let errors = match &failure {
                    DriverFailure::Compile { errors } => errors.clone(),
                    _ => Vec::new(),
                };
                let _ = self.events.send(DriverEvent::CompileFailed {
                    message: failure.to_string(),
                    errors,
                });

                if terminal {
                    if let Some(ready) = ready.take() {
                        let _ = ready.send(Err(failure));
                    }
                    Cycle::Terminal
                } else {
                    Cycle::Continue
                }
            }
        }
    }

    async fn complete(
        &self,
        stats: CompileStats,
    ) -> std::result::Result<(L::Artifact, Vec<String>), DriverFailure> {
        if stats.has_warnings() && !self.options.interactive {
            for warning in &stats.warnings {
                tracing::warn!("{warning}");
            }
        }

        if stats.has_errors() {
            if !self.options.interactive {
                for error in &stats.errors {
                    tracing::error!("{error}");
                }
            }
            return Err(DriverFailure::Compile {
                errors: stats.errors,
            });
        }

        let artifact = self
            .loader
            .load(&stats)
            .await
            .map_err(|e| DriverFailure::Artifact(e.to_string()))?;
        Ok((artifact, stats.warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_starts_empty() {
        let register: Register<u32> = Register::new();
        let snapshot = register.snapshot();
        assert!(snapshot.artifact.is_none());
        assert!(snapshot.error.is_none());
        assert!(!snapshot.terminal);
    }

    #[test]
    fn register_replaces_both_halves_together() {
        let register: Register<u32> = Register::new();
        let before = register.snapshot();

        register.replace(Snapshot {
            artifact: Some(7),
            error: Some(DriverFailure::Bundler("x".into())),
            terminal: false,
        });

        assert!(before.artifact.is_none());
        let after = register.snapshot();
        assert_eq!(after.artifact, Some(7));
        assert_eq!(after.error, Some(DriverFailure::Bundler("x".into())));
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(DriverEvent::Compiled {
            duration_ms: 12,
            warnings: vec!["unused import".into()],
        })
        .unwrap();
        assert_eq!(json["type"], "Compiled");
        assert_eq!(json["duration_ms"], 12);
        assert_eq!(json["warnings"][0], "unused import");
    }

    #[test]
    fn compile_failure_counts_errors() {
        let failure = DriverFailure::Compile {
            errors: vec!["a".into(), "b".into()],
        };
        assert_eq!(failure.to_string(), "compilation failed with 2 error(s)");
    }
}
